//! Validation of inbound documents
//!
//! A document is trusted only after every check passes:
//! 1. the declared MIME type is allowed and the bytes look like JSON text
//! 2. the bytes parse
//! 3. the format version is one this engine reads and the structure matches
//!    the embedded JSON Schema
//! 4. every sidebar entry resolves into `widgets` or is the missing placeholder
//!
//! Documents without a `formatVersion` are read as the version-less layout
//! older exporters produced (`{ sidebar: { widget-id: settings } }`) and
//! upgraded on the way in.

use std::collections::{HashMap, HashSet};

use jsonschema::{Draft, JSONSchema};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{default_max_document_bytes, default_mime_types, ImportConfig};
use crate::error::ValidationError;
use crate::schema::{
    json_kind, ExportDocument, Settings, Sidebar, WidgetInstance, WidgetRef, FORMAT_VERSION,
};

const DOCUMENT_SCHEMA: &str = include_str!("../schemas/export-document.v1.schema.json");
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// Schema violations listed in one error message
const MAX_REPORTED_VIOLATIONS: usize = 3;

/// Checks uploaded bytes before anything is merged
pub struct Validator {
    allowed_mime_types: Vec<String>,
    max_document_bytes: usize,
    schema: JSONSchema,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            allowed_mime_types: default_mime_types(),
            max_document_bytes: default_max_document_bytes(),
            schema: compile_document_schema(),
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            allowed_mime_types: config
                .allowed_mime_types
                .iter()
                .map(|m| normalize_mime(m))
                .collect(),
            max_document_bytes: config.max_document_bytes,
            schema: compile_document_schema(),
        }
    }

    /// Replace the accepted MIME types
    pub fn with_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_mime_types = mime_types
            .into_iter()
            .map(|m| normalize_mime(m.as_ref()))
            .collect();
        self
    }

    pub fn with_max_document_bytes(mut self, max: usize) -> Self {
        self.max_document_bytes = max;
        self
    }

    /// Validate raw upload bytes and return the trusted document
    pub fn validate(
        &self,
        bytes: &[u8],
        claimed_mime: &str,
    ) -> Result<ExportDocument, ValidationError> {
        self.check_mime(claimed_mime)?;
        let text = self.sniff(bytes)?;

        let value: Value = serde_json::from_str(text)
            .map_err(|e| ValidationError::MalformedDocument(e.to_string()))?;
        let document = self.read_document(value)?;
        check_references(&document)?;

        debug!(
            format_version = document.format_version,
            generator = %document.generator_version,
            sidebars = document.sidebars.len(),
            widgets = document.widgets.len(),
            "document validated"
        );
        Ok(document)
    }

    fn check_mime(&self, claimed_mime: &str) -> Result<(), ValidationError> {
        let mime = normalize_mime(claimed_mime);
        if self.allowed_mime_types.iter().any(|allowed| *allowed == mime) {
            Ok(())
        } else {
            Err(ValidationError::UntrustedContent(format!(
                "declared type `{}` is not an accepted document type",
                claimed_mime
            )))
        }
    }

    fn sniff<'b>(&self, bytes: &'b [u8]) -> Result<&'b str, ValidationError> {
        if bytes.len() > self.max_document_bytes {
            return Err(ValidationError::UntrustedContent(format!(
                "document is {} bytes, over the {} byte limit",
                bytes.len(),
                self.max_document_bytes
            )));
        }
        let bytes = bytes.strip_prefix(&UTF8_BOM[..]).unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|_| {
                ValidationError::UntrustedContent("document is not UTF-8 text".to_string())
            })?;
        match text.trim_start().chars().next() {
            Some('{') => Ok(text),
            _ => Err(ValidationError::UntrustedContent(
                "content does not look like a JSON document".to_string(),
            )),
        }
    }

    fn read_document(&self, value: Value) -> Result<ExportDocument, ValidationError> {
        let Value::Object(map) = &value else {
            return Err(ValidationError::MalformedDocument(format!(
                "top level must be an object, found {}",
                json_kind(&value)
            )));
        };

        let Some(version) = map.get("formatVersion") else {
            debug!("no formatVersion, reading as a version-less document");
            return upgrade_versionless(map);
        };
        let found = version.as_i64().ok_or_else(|| {
            ValidationError::MalformedDocument(format!(
                "formatVersion must be an integer, found {}",
                json_kind(version)
            ))
        })?;
        if found < 1 || found > i64::from(FORMAT_VERSION) {
            return Err(ValidationError::UnsupportedFormatVersion {
                found,
                supported: FORMAT_VERSION,
            });
        }

        self.check_structure(&value)?;
        serde_json::from_value(value).map_err(|e| ValidationError::MalformedDocument(e.to_string()))
    }

    fn check_structure(&self, value: &Value) -> Result<(), ValidationError> {
        if let Err(errors) = self.schema.validate(value) {
            let violations: Vec<String> = errors
                .take(MAX_REPORTED_VIOLATIONS)
                .map(|e| format!("{} (at \"{}\")", e, e.instance_path))
                .collect();
            return Err(ValidationError::MalformedDocument(violations.join("; ")));
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that sidebars and widgets are unique and every entry resolves
pub fn check_references(document: &ExportDocument) -> Result<(), ValidationError> {
    let mut sidebar_ids = HashSet::new();
    for sidebar in &document.sidebars {
        if !sidebar_ids.insert(sidebar.id.as_str()) {
            return Err(ValidationError::MalformedDocument(format!(
                "sidebar {} appears more than once",
                sidebar.id
            )));
        }
    }

    let widgets = document.widget_index();
    if widgets.len() != document.widgets.len() {
        let mut seen = HashSet::new();
        let duplicate = document
            .widgets
            .iter()
            .find(|w| !seen.insert((w.widget_type.as_str(), w.legacy_index)))
            .map(|w| w.reference().to_string())
            .unwrap_or_default();
        return Err(ValidationError::MalformedDocument(format!(
            "widget {} appears more than once",
            duplicate
        )));
    }

    for sidebar in &document.sidebars {
        for widget in &sidebar.widgets {
            if let WidgetRef::Widget { widget_type, index } = widget {
                if !widgets.contains_key(&(widget_type.as_str(), *index)) {
                    return Err(ValidationError::DanglingReference {
                        sidebar: sidebar.id.clone(),
                        widget: widget.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Lower-case type and subtype, parameters dropped
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn compile_document_schema() -> JSONSchema {
    let schema: Value =
        serde_json::from_str(DOCUMENT_SCHEMA).expect("embedded document schema is JSON");
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .expect("embedded document schema compiles")
}

/// Read `{ sidebar: { widget-id: settings } }` into the current model
///
/// Sidebar and widget order follow the key order of the input. An empty
/// sidebar may appear as `[]`.
fn upgrade_versionless(map: &Map<String, Value>) -> Result<ExportDocument, ValidationError> {
    let mut document = ExportDocument::new(String::new());
    let mut positions: HashMap<WidgetRef, usize> = HashMap::new();

    for (sidebar_id, entries) in map {
        let entries = match entries {
            Value::Object(entries) => entries.iter().collect::<Vec<_>>(),
            Value::Array(items) if items.is_empty() => Vec::new(),
            other => {
                return Err(ValidationError::MalformedDocument(format!(
                    "no formatVersion, and {} is {} rather than a map of widgets",
                    sidebar_id,
                    json_kind(other)
                )))
            }
        };

        let mut refs = Vec::with_capacity(entries.len());
        for (widget_id, settings) in entries {
            let widget = WidgetRef::parse(widget_id).ok_or_else(|| {
                ValidationError::MalformedDocument(format!(
                    "invalid widget id `{}` in sidebar {}",
                    widget_id, sidebar_id
                ))
            })?;

            if let WidgetRef::Widget { widget_type, index } = &widget {
                let settings = versionless_settings(settings).ok_or_else(|| {
                    ValidationError::MalformedDocument(format!(
                        "settings of {} must be an object, found {}",
                        widget,
                        json_kind(settings)
                    ))
                })?;
                match positions.get(&widget) {
                    Some(&position) if document.widgets[position].settings != settings => {
                        return Err(ValidationError::MalformedDocument(format!(
                            "widget {} appears twice with different settings",
                            widget
                        )));
                    }
                    Some(_) => {}
                    None => {
                        positions.insert(widget.clone(), document.widgets.len());
                        let instance = WidgetInstance::new(widget_type.clone(), *index, settings);
                        document.widgets.push(instance);
                    }
                }
            }
            refs.push(widget);
        }
        document.sidebars.push(Sidebar::new(sidebar_id.clone(), String::new(), refs));
    }
    Ok(document)
}

fn versionless_settings(value: &Value) -> Option<Settings> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Array(items) if items.is_empty() => Some(Settings::new()),
        _ => None,
    }
}
