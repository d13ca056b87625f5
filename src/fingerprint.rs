//! Content fingerprints for matching widgets across installations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::canonical_string;
use crate::schema::{Settings, WidgetInstance};

/// SHA256 fingerprint of a widget's type and canonical settings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a widget type and its settings
    pub fn of(widget_type: &str, settings: &Settings) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(widget_type.as_bytes());
        // Separator between type and settings.
        hasher.update([0u8]);
        hasher.update(canonical_string(settings).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Compute the fingerprint of a widget instance
    pub fn of_instance(instance: &WidgetInstance) -> Self {
        Self::of(&instance.widget_type, &instance.settings)
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
