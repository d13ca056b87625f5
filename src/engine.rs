//! Caller-facing export and import operations

use serde::Serialize;
use tracing::{info, warn};

use crate::apply::{Applier, Summary};
use crate::config::TransferConfig;
use crate::error::{ImportWarning, Result};
use crate::export::Exporter;
use crate::hooks::{NoHooks, TransferHooks};
use crate::merge::{merge, SidebarSelection, WriteBackPlan};
use crate::registry::{RegistryReader, WidgetRegistry};
use crate::schema::RegistrySnapshot;
use crate::validate::{check_references, Validator};

/// Result of an applied import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub summary: Summary,
    pub warnings: Vec<ImportWarning>,
}

/// Export and import against one registry
///
/// Operations run one at a time: imports take `&mut self`, and the engine
/// assumes nothing else writes the registry between its snapshot and its
/// write-back.
pub struct WidgetTransfer<R, H = NoHooks> {
    registry: R,
    hooks: H,
    exporter: Exporter,
    validator: Validator,
}

impl<R: WidgetRegistry> WidgetTransfer<R, NoHooks> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            hooks: NoHooks,
            exporter: Exporter::default(),
            validator: Validator::new(),
        }
    }
}

impl<R: WidgetRegistry, H: TransferHooks> WidgetTransfer<R, H> {
    /// Use export and import settings from configuration
    pub fn with_config(mut self, config: &TransferConfig) -> Self {
        self.exporter = Exporter::from_config(&config.export, config.generator_version());
        self.validator = Validator::from_config(&config.import);
        self
    }

    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_hooks<H2: TransferHooks>(self, hooks: H2) -> WidgetTransfer<R, H2> {
        WidgetTransfer {
            registry: self.registry,
            hooks,
            exporter: self.exporter,
            validator: self.validator,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn into_registry(self) -> R {
        self.registry
    }

    /// Snapshot the live registry
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        RegistryReader::new(&self.registry).snapshot()
    }

    /// Export the live registry as document bytes
    pub fn export(&self) -> Result<Vec<u8>> {
        let snapshot = self.hooks.before_export(self.snapshot()?);
        let bytes = self.exporter.serialize(&snapshot)?;
        info!(bytes = bytes.len(), sidebars = snapshot.sidebars.len(), "widgets exported");
        Ok(bytes)
    }

    /// Validate a document and plan its import without writing anything
    pub fn plan_import(
        &self,
        bytes: &[u8],
        declared_mime: &str,
        selection: &SidebarSelection,
    ) -> Result<WriteBackPlan> {
        let document = self.validator.validate(bytes, declared_mime)?;
        let document = self.hooks.before_import(document);
        check_references(&document)?;

        let document_types = document.widgets.iter().map(|w| w.widget_type.clone());
        let live = RegistryReader::new(&self.registry).snapshot_with_types(document_types)?;
        Ok(merge(&live, &document, selection)?)
    }

    /// Validate, plan and apply an import
    pub fn import(
        &mut self,
        bytes: &[u8],
        declared_mime: &str,
        selection: &SidebarSelection,
    ) -> Result<ImportOutcome> {
        let plan = self.plan_import(bytes, declared_mime, selection)?;
        for warning in &plan.warnings {
            warn!(%warning, "import warning");
        }
        let summary = Applier::new(&mut self.registry).apply(&plan)?;
        Ok(ImportOutcome {
            summary,
            warnings: plan.warnings,
        })
    }
}
