//! Widget Transfer
//!
//! Portable import/export of sidebar widget configuration, with a
//! non-destructive merge on import.
//!
//! ## Features
//!
//! - **Deterministic Export**: The same registry state always serializes to the same bytes
//! - **Untrusted Input Validation**: MIME allow-list, size limit, JSON Schema and reference checks
//! - **Non-destructive Merge**: Unchanged widgets keep their instance; displaced ones
//!   move to the inactive bucket
//! - **Read-Modify-Write**: Imports never overwrite instances they did not create
//! - **Legacy Documents**: Versionless `.wie` exports are upgraded on import
//!
//! ## Flow
//!
//! ```text
//! export:  WidgetRegistry ─► RegistrySnapshot ─► before_export ─► Exporter ─► bytes
//! import:  bytes ─► Validator ─► before_import ─► merge(snapshot)
//!                ─► WriteBackPlan ─► Applier
//! ```

pub mod apply;
pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod hooks;
pub mod merge;
pub mod registry;
pub mod schema;
pub mod validate;

pub use apply::{Applier, Summary};
pub use config::TransferConfig;
pub use engine::{ImportOutcome, WidgetTransfer};
pub use error::{
    ImportWarning, RegistryError, Result, TransferError, ValidationError, WriteBackError,
};
pub use export::Exporter;
pub use fingerprint::Fingerprint;
pub use hooks::{Hooks, NoHooks, TransferHooks};
pub use merge::{merge, SidebarSelection, WriteBackPlan};
pub use registry::{MemoryRegistry, RegistryReader, RegistryState, WidgetRegistry};
pub use schema::{ExportDocument, RegistrySnapshot, Settings, Sidebar, WidgetInstance, WidgetRef};
pub use validate::Validator;
