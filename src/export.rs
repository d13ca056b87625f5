//! Serializes registry snapshots to the portable document format

use std::collections::HashSet;

use tracing::debug;

use crate::canonical::canonical_settings;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::schema::{ExportDocument, RegistrySnapshot, Sidebar, WidgetInstance, WidgetRef};

/// Turns a [`RegistrySnapshot`] into document bytes
///
/// Output depends only on the snapshot: sidebars keep snapshot order,
/// widgets are listed in order of first reference and settings keys are
/// sorted.
#[derive(Debug, Clone)]
pub struct Exporter {
    generator_version: String,
    pretty: bool,
    include_inactive: bool,
}

impl Exporter {
    pub fn new(generator_version: impl Into<String>) -> Self {
        Self {
            generator_version: generator_version.into(),
            pretty: true,
            include_inactive: true,
        }
    }

    pub fn from_config(config: &ExportConfig, generator_version: impl Into<String>) -> Self {
        Self {
            generator_version: generator_version.into(),
            pretty: config.pretty,
            include_inactive: config.include_inactive,
        }
    }

    /// Indent the output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Export the inactive and orphaned buckets along with active sidebars
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    /// Build the document for a snapshot
    pub fn document(&self, snapshot: &RegistrySnapshot) -> ExportDocument {
        let mut document = ExportDocument::new(self.generator_version.clone());
        let mut listed: HashSet<WidgetRef> = HashSet::new();

        for sidebar in &snapshot.sidebars {
            if !self.include_inactive && (sidebar.is_inactive() || sidebar.is_orphaned()) {
                continue;
            }

            let mut widgets = Vec::with_capacity(sidebar.widgets.len());
            for widget in &sidebar.widgets {
                match snapshot.instance(widget) {
                    Some(instance) => {
                        if listed.insert(widget.clone()) {
                            document.widgets.push(WidgetInstance {
                                settings: canonical_settings(&instance.settings),
                                ..instance
                            });
                        }
                        widgets.push(widget.clone());
                    }
                    None => widgets.push(WidgetRef::Missing),
                }
            }
            document.sidebars.push(Sidebar::new(sidebar.id.clone(), sidebar.name.clone(), widgets));
        }

        debug!(
            sidebars = document.sidebars.len(),
            widgets = document.widgets.len(),
            "built export document"
        );
        document
    }

    /// Serialize a snapshot
    pub fn serialize(&self, snapshot: &RegistrySnapshot) -> Result<Vec<u8>> {
        self.serialize_document(&self.document(snapshot))
    }

    /// Serialize an already-built document
    pub fn serialize_document(&self, document: &ExportDocument) -> Result<Vec<u8>> {
        if self.pretty {
            let mut bytes = serde_json::to_vec_pretty(document)?;
            bytes.push(b'\n');
            Ok(bytes)
        } else {
            Ok(serde_json::to_vec(document)?)
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}
