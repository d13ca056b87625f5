//! Error types for widget import and export

use serde::Serialize;
use thiserror::Error;

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Failure reported by the host registry collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry cannot be read: {0}")]
    Unavailable(String),

    #[error("registry rejected write to {target}: {reason}")]
    Rejected { target: String, reason: String },
}

/// Reasons an inbound document is refused before any merge runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Untrusted content: {0}")]
    UntrustedContent(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported format version {found} (this engine reads 1 through {supported})")]
    UnsupportedFormatVersion { found: i64, supported: u32 },

    #[error("Sidebar {sidebar} references {widget}, which is not in the document's widgets")]
    DanglingReference { sidebar: String, widget: String },
}

/// Failures committing a write-back plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteBackError {
    /// The registry changed after the snapshot was taken. Nothing was written.
    #[error("index {index} of widget type {widget_type} was taken after the plan was computed")]
    IndexConflict { widget_type: String, index: u32 },

    /// The type's bucket already holds index `u32::MAX`. Nothing was written.
    #[error("widget type {widget_type} has no free index left")]
    IndexExhausted { widget_type: String },

    /// Reading the buckets to update, or the first write, failed. Nothing was written.
    #[error("registry write-back failed before anything was committed: {0}")]
    Registry(RegistryError),

    /// A write failed after earlier writes had already been committed.
    #[error("write to {failed} failed after {} committed write(s): {source}", committed.len())]
    Partial {
        committed: Vec<String>,
        failed: String,
        #[source]
        source: RegistryError,
    },
}

/// Top-level error for engine operations
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Write-back failed: {0}")]
    WriteBack(#[from] WriteBackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

/// Non-fatal conditions found while planning an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    /// The target has no registered region with this id. Widgets are still stored under it.
    SidebarNotRegistered { sidebar: String },
    /// The target does not register this widget type. The instance is still stored.
    WidgetTypeNotRegistered { widget_type: String, sidebar: String },
    /// A sidebar was selected for import but the document does not contain it.
    SidebarNotInDocument { sidebar: String },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportWarning::SidebarNotRegistered { sidebar } => {
                write!(
                    f,
                    "sidebar {} is not registered on this site; its widgets were stored anyway",
                    sidebar
                )
            }
            ImportWarning::WidgetTypeNotRegistered { widget_type, sidebar } => {
                write!(
                    f,
                    "widget type {} (in {}) is not registered on this site",
                    widget_type, sidebar
                )
            }
            ImportWarning::SidebarNotInDocument { sidebar } => {
                write!(f, "sidebar {} was selected but is not in the document", sidebar)
            }
        }
    }
}
