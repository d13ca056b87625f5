//! Configuration management for widget transfer
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (widgets.toml)
//! - Environment variables (WIDGETS_*)
//!
//! ## Example config file (widgets.toml):
//! ```toml
//! [export]
//! pretty = true
//! include_inactive = false
//!
//! [import]
//! allowed_mime_types = ["application/json", "text/plain"]
//! max_document_bytes = 1048576
//!
//! [registry]
//! state_path = "./site-widgets.json"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Reference registry settings (command-line tools)
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Indented output instead of a single line
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Export the inactive and orphaned buckets too
    #[serde(default = "default_true")]
    pub include_inactive: bool,

    /// Value written to `generatorVersion`; the crate version when unset
    #[serde(default)]
    pub generator_version: Option<String>,
}

/// Import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Declared MIME types accepted for uploaded documents
    #[serde(default = "default_mime_types")]
    pub allowed_mime_types: Vec<String>,

    /// Documents larger than this are refused unread
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

/// Registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// JSON state file the command-line tools read and write
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

// Default value functions
fn default_true() -> bool {
    true
}

pub(crate) fn default_mime_types() -> Vec<String> {
    vec![
        "application/json".to_string(),
        "text/json".to_string(),
        "text/plain".to_string(),
    ]
}

pub(crate) fn default_max_document_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            include_inactive: true,
            generator_version: None,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: default_mime_types(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["widgets.toml", ".widgets.toml", "config/widgets.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        let project_dirs =
            directories::ProjectDirs::from("org", "widget-transfer", "widget-transfer");
        if let Some(config_dir) = project_dirs {
            let xdg_config = config_dir.config_dir().join("widgets.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // WIDGETS_EXPORT__PRETTY=false and the like
        builder = builder.add_source(
            Environment::with_prefix("WIDGETS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The version string written into exported documents
    pub fn generator_version(&self) -> String {
        self.export
            .generator_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert!(config.export.pretty);
        assert!(config.export.include_inactive);
        assert!(config.import.allowed_mime_types.contains(&"application/json".to_string()));
        assert_eq!(config.generator_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_serialize_config() {
        let config = TransferConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[export]"));
        assert!(toml_str.contains("[import]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            concat!(
                "[export]\n",
                "include_inactive = false\n",
                "generator_version = \"site-tools 2\"\n",
                "\n",
                "[import]\n",
                "max_document_bytes = 1024\n",
            ),
        )
        .unwrap();

        let config = TransferConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert!(!config.export.include_inactive);
        assert!(config.export.pretty);
        assert_eq!(config.generator_version(), "site-tools 2");
        assert_eq!(config.import.max_document_bytes, 1024);
        assert_eq!(config.import.allowed_mime_types, default_mime_types());
    }
}
