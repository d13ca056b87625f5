//! Canonical encoding of widget settings
//!
//! Both the exporter and the merger go through this module, so an exported
//! document and a live registry agree on when two settings maps are equal.
//!
//! The canonical form:
//! - object keys sorted by byte order, at every depth
//! - integral floats written as integers (`5.0` becomes `5`, `-0.0` becomes `0`)
//! - everything else untouched, including numeric-looking strings

use serde_json::{Map, Number, Value};

use crate::schema::Settings;

/// Largest magnitude at which every integer is exactly representable in an f64
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Return the canonical form of a JSON value
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(canonical_settings(map)),
        other => other.clone(),
    }
}

/// Return the canonical form of a settings map
pub fn canonical_settings(settings: &Settings) -> Settings {
    let mut entries: Vec<(&String, &Value)> = settings.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
        .into_iter()
        .map(|(key, value)| (key.clone(), canonical_value(value)))
        .collect::<Map<String, Value>>()
}

/// Serialize settings in canonical form
pub fn canonical_string(settings: &Settings) -> String {
    // Serializing a Value built from string keys cannot fail.
    serde_json::to_string(&Value::Object(canonical_settings(settings))).unwrap_or_default()
}

fn canonical_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => {
            Number::from(f as i64)
        }
        _ => n.clone(),
    }
}
