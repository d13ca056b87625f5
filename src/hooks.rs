//! Host-supplied transformations run before export and before import

use crate::schema::{ExportDocument, RegistrySnapshot};

/// Pure transformations a host can inject
///
/// `before_export` sees the snapshot about to be serialized;
/// `before_import` sees a validated document before it is merged. The
/// document is checked for dangling references again afterwards.
pub trait TransferHooks {
    fn before_export(&self, snapshot: RegistrySnapshot) -> RegistrySnapshot {
        snapshot
    }

    fn before_import(&self, document: ExportDocument) -> ExportDocument {
        document
    }
}

/// Leaves everything unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl TransferHooks for NoHooks {}

type ExportFilter = Box<dyn Fn(RegistrySnapshot) -> RegistrySnapshot>;
type ImportFilter = Box<dyn Fn(ExportDocument) -> ExportDocument>;

/// Closure-based hooks, applied in the order they were added
#[derive(Default)]
pub struct Hooks {
    export_filters: Vec<ExportFilter>,
    import_filters: Vec<ImportFilter>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_export(
        mut self,
        filter: impl Fn(RegistrySnapshot) -> RegistrySnapshot + 'static,
    ) -> Self {
        self.export_filters.push(Box::new(filter));
        self
    }

    pub fn on_import(
        mut self,
        filter: impl Fn(ExportDocument) -> ExportDocument + 'static,
    ) -> Self {
        self.import_filters.push(Box::new(filter));
        self
    }
}

impl TransferHooks for Hooks {
    fn before_export(&self, snapshot: RegistrySnapshot) -> RegistrySnapshot {
        self.export_filters.iter().fold(snapshot, |acc, filter| filter(acc))
    }

    fn before_import(&self, document: ExportDocument) -> ExportDocument {
        self.import_filters.iter().fold(document, |acc, filter| filter(acc))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("export_filters", &self.export_filters.len())
            .field("import_filters", &self.import_filters.len())
            .finish()
    }
}
