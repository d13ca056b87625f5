//! Widget Registry
//!
//! The host's live widget storage is reached only through the
//! [`WidgetRegistry`] trait. [`RegistryReader`] turns it into a
//! [`RegistrySnapshot`]; the applier writes plans back through the same
//! trait. [`MemoryRegistry`] is a reference implementation backed by a
//! [`RegistryState`] value, used by the command-line tools and tests.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::schema::{RegistrySnapshot, Settings, Sidebar, WidgetBucket, WidgetRef};

/// A sidebar as the host lists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Whether the active theme registers this region
    #[serde(default)]
    pub registered: bool,
}

/// Read/write contract of the host's widget storage
///
/// Writes are atomic per bucket or per sidebar; nothing spans both.
pub trait WidgetRegistry {
    /// Registered regions and stored sidebars, inactive bucket included, in host order
    fn sidebars(&self) -> std::result::Result<Vec<SidebarInfo>, RegistryError>;

    /// Ordered entries of one sidebar. Unknown ids have no entries.
    fn sidebar_widgets(
        &self,
        sidebar_id: &str,
    ) -> std::result::Result<Vec<WidgetRef>, RegistryError>;

    /// Widget types the host registers
    fn widget_types(&self) -> std::result::Result<Vec<String>, RegistryError>;

    /// Every stored instance of one widget type
    fn bucket(&self, widget_type: &str) -> std::result::Result<WidgetBucket, RegistryError>;

    /// Replace a whole widget bucket
    fn replace_bucket(
        &mut self,
        widget_type: &str,
        bucket: WidgetBucket,
    ) -> std::result::Result<(), RegistryError>;

    /// Replace the ordered entries of a sidebar, creating it if needed
    fn replace_sidebar(
        &mut self,
        sidebar_id: &str,
        widgets: Vec<WidgetRef>,
    ) -> std::result::Result<(), RegistryError>;
}

/// Takes point-in-time snapshots of a registry
pub struct RegistryReader<'a, R: ?Sized> {
    registry: &'a R,
}

impl<'a, R: WidgetRegistry + ?Sized> RegistryReader<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    /// Read every sidebar and every bucket a sidebar or the host type list names
    ///
    /// Entries whose instance is absent from its bucket come back as
    /// [`WidgetRef::Missing`].
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        self.snapshot_with_types(std::iter::empty::<String>())
    }

    /// Like [`snapshot`](Self::snapshot), also reading the buckets of `extra_types`
    ///
    /// An import reads the bucket of every type its document names, so
    /// instances of types the host no longer registers still count when
    /// new indices are allocated.
    pub fn snapshot_with_types<I, S>(&self, extra_types: I) -> Result<RegistrySnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let infos = self.registry.sidebars()?;
        let widget_types: BTreeSet<String> = self.registry.widget_types()?.into_iter().collect();

        let mut sidebars = Vec::with_capacity(infos.len());
        let mut registered_sidebars = BTreeSet::new();
        let mut types_to_read = widget_types.clone();
        types_to_read.extend(extra_types.into_iter().map(Into::into));

        for info in infos {
            let widgets = self.registry.sidebar_widgets(&info.id)?;
            types_to_read.extend(
                widgets
                    .iter()
                    .filter_map(|w| w.widget_type().map(str::to_string)),
            );
            if info.registered {
                registered_sidebars.insert(info.id.clone());
            }
            sidebars.push(Sidebar::new(info.id, info.name, widgets));
        }

        let mut snapshot = RegistrySnapshot {
            sidebars,
            registered_sidebars,
            widget_types,
            ..RegistrySnapshot::default()
        };
        for widget_type in types_to_read {
            let bucket = self.registry.bucket(&widget_type)?;
            snapshot.buckets.insert(widget_type, bucket);
        }

        let buckets = &snapshot.buckets;
        for sidebar in &mut snapshot.sidebars {
            for widget in &mut sidebar.widgets {
                let resolves = match widget {
                    WidgetRef::Widget { widget_type, index } => {
                        buckets.get(widget_type.as_str()).is_some_and(|b| b.contains(*index))
                    }
                    WidgetRef::Missing => true,
                };
                if !resolves {
                    debug!(
                        sidebar = %sidebar.id,
                        widget = %widget,
                        "stored widget has no settings, reading as missing"
                    );
                    *widget = WidgetRef::Missing;
                }
            }
        }

        debug!(
            sidebars = snapshot.sidebars.len(),
            buckets = snapshot.buckets.len(),
            "registry snapshot taken"
        );
        Ok(snapshot)
    }
}

/// A stored sidebar in [`RegistryState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSidebar {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub widgets: Vec<WidgetRef>,
}

/// Full contents of a [`MemoryRegistry`], loadable from a JSON state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub sidebars: Vec<StoredSidebar>,
    #[serde(default)]
    pub widget_types: Vec<String>,
    #[serde(default)]
    pub buckets: std::collections::BTreeMap<String, WidgetBucket>,
}

impl RegistryState {
    /// Load state from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save state as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// In-memory registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRegistry {
    state: RegistryState,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RegistryState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    pub fn into_state(self) -> RegistryState {
        self.state
    }

    /// Register a region, as a theme would
    pub fn register_sidebar(&mut self, id: &str, name: &str) -> &mut Self {
        match self.state.sidebars.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.registered = true;
                existing.name = name.to_string();
            }
            None => self.state.sidebars.push(StoredSidebar {
                id: id.to_string(),
                name: name.to_string(),
                registered: true,
                widgets: Vec::new(),
            }),
        }
        self
    }

    /// Register a widget type
    pub fn register_widget_type(&mut self, widget_type: &str) -> &mut Self {
        if !self.state.widget_types.iter().any(|t| t == widget_type) {
            self.state.widget_types.push(widget_type.to_string());
        }
        self
    }

    /// Store a new instance and append it to a sidebar, returning its reference
    ///
    /// `None`, with nothing stored, when the type's bucket has no index left.
    pub fn add_widget(
        &mut self,
        sidebar_id: &str,
        widget_type: &str,
        settings: Settings,
    ) -> Option<WidgetRef> {
        let bucket = self.state.buckets.entry(widget_type.to_string()).or_default();
        let index = bucket.next_index()?;
        bucket.insert(index, settings);

        let widget = WidgetRef::widget(widget_type, index);
        self.stored_sidebar_mut(sidebar_id).widgets.push(widget.clone());
        Some(widget)
    }

    /// Entries of a sidebar, empty when unknown
    pub fn widgets_in(&self, sidebar_id: &str) -> &[WidgetRef] {
        self.state
            .sidebars
            .iter()
            .find(|s| s.id == sidebar_id)
            .map(|s| s.widgets.as_slice())
            .unwrap_or_default()
    }

    /// Settings stored for a reference
    pub fn settings(&self, widget: &WidgetRef) -> Option<&Settings> {
        match widget {
            WidgetRef::Widget { widget_type, index } => {
                self.state.buckets.get(widget_type)?.get(*index)
            }
            WidgetRef::Missing => None,
        }
    }

    fn stored_sidebar_mut(&mut self, sidebar_id: &str) -> &mut StoredSidebar {
        let position = match self.state.sidebars.iter().position(|s| s.id == sidebar_id) {
            Some(position) => position,
            None => {
                self.state.sidebars.push(StoredSidebar {
                    id: sidebar_id.to_string(),
                    name: String::new(),
                    registered: false,
                    widgets: Vec::new(),
                });
                self.state.sidebars.len() - 1
            }
        };
        &mut self.state.sidebars[position]
    }
}

impl WidgetRegistry for MemoryRegistry {
    fn sidebars(&self) -> std::result::Result<Vec<SidebarInfo>, RegistryError> {
        Ok(self
            .state
            .sidebars
            .iter()
            .map(|s| SidebarInfo {
                id: s.id.clone(),
                name: s.name.clone(),
                registered: s.registered,
            })
            .collect())
    }

    fn sidebar_widgets(
        &self,
        sidebar_id: &str,
    ) -> std::result::Result<Vec<WidgetRef>, RegistryError> {
        Ok(self.widgets_in(sidebar_id).to_vec())
    }

    fn widget_types(&self) -> std::result::Result<Vec<String>, RegistryError> {
        Ok(self.state.widget_types.clone())
    }

    fn bucket(&self, widget_type: &str) -> std::result::Result<WidgetBucket, RegistryError> {
        Ok(self.state.buckets.get(widget_type).cloned().unwrap_or_default())
    }

    fn replace_bucket(
        &mut self,
        widget_type: &str,
        bucket: WidgetBucket,
    ) -> std::result::Result<(), RegistryError> {
        self.state.buckets.insert(widget_type.to_string(), bucket);
        Ok(())
    }

    fn replace_sidebar(
        &mut self,
        sidebar_id: &str,
        widgets: Vec<WidgetRef>,
    ) -> std::result::Result<(), RegistryError> {
        self.stored_sidebar_mut(sidebar_id).widgets = widgets;
        Ok(())
    }
}
