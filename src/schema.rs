//! Schema model: sidebars, widget instances, buckets and the export document

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Widget settings, opaque to the engine
pub type Settings = serde_json::Map<String, Value>;

/// Document format version written by this engine
pub const FORMAT_VERSION: u32 = 1;

/// Id of the pseudo-sidebar holding widgets detached from every active sidebar
pub const INACTIVE_SIDEBAR_ID: &str = "wp_inactive_widgets";

/// Prefix of sidebars the host keeps for regions the current theme no longer registers
pub const ORPHANED_SIDEBAR_PREFIX: &str = "orphaned_widgets_";

/// Placeholder written where a referenced widget instance no longer exists
pub const MISSING_WIDGET: &str = "missing-widget";

/// A sidebar entry: a widget instance address or the missing placeholder
///
/// Serialized as the host's native widget id, `"{type}-{index}"`
/// (`"recent-posts-3"`), or as `"missing-widget"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WidgetRef {
    Widget { widget_type: String, index: u32 },
    Missing,
}

impl WidgetRef {
    /// Reference an instance of a widget type
    pub fn widget(widget_type: impl Into<String>, index: u32) -> Self {
        WidgetRef::Widget {
            widget_type: widget_type.into(),
            index,
        }
    }

    /// Parse a native widget id
    ///
    /// The index is the digits after the last `-`, so types may themselves
    /// contain dashes.
    pub fn parse(id: &str) -> Option<Self> {
        if id == MISSING_WIDGET {
            return Some(WidgetRef::Missing);
        }
        let (widget_type, index) = id.rsplit_once('-')?;
        let digits = !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit());
        if widget_type.is_empty() || !digits {
            return None;
        }
        Some(WidgetRef::widget(widget_type, index.parse().ok()?))
    }

    /// Widget type, unless this is the placeholder
    pub fn widget_type(&self) -> Option<&str> {
        match self {
            WidgetRef::Widget { widget_type, .. } => Some(widget_type),
            WidgetRef::Missing => None,
        }
    }

}

impl fmt::Display for WidgetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetRef::Widget { widget_type, index } => write!(f, "{}-{}", widget_type, index),
            WidgetRef::Missing => f.write_str(MISSING_WIDGET),
        }
    }
}

impl TryFrom<String> for WidgetRef {
    type Error = String;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        WidgetRef::parse(&id).ok_or_else(|| format!("invalid widget id `{}`", id))
    }
}

impl From<WidgetRef> for String {
    fn from(widget: WidgetRef) -> Self {
        widget.to_string()
    }
}

/// One configured widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetInstance {
    /// Widget kind (e.g. "text", "recent-posts")
    #[serde(rename = "type")]
    pub widget_type: String,
    /// Slot within the type's bucket on the exporting site
    #[serde(rename = "index")]
    pub legacy_index: u32,
    #[serde(default, deserialize_with = "deserialize_settings")]
    pub settings: Settings,
}

impl WidgetInstance {
    pub fn new(widget_type: impl Into<String>, legacy_index: u32, settings: Settings) -> Self {
        Self {
            widget_type: widget_type.into(),
            legacy_index,
            settings,
        }
    }

    /// The sidebar entry addressing this instance
    pub fn reference(&self) -> WidgetRef {
        WidgetRef::widget(self.widget_type.clone(), self.legacy_index)
    }
}

/// Settings arrive as an object, or as `[]` when the exporter had an empty map
fn deserialize_settings<'de, D>(deserializer: D) -> Result<Settings, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Settings::new()),
        Value::Array(items) if items.is_empty() => Ok(Settings::new()),
        other => Err(de::Error::custom(format!(
            "widget settings must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A named display region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidebar {
    /// Stable slug, unique per installation
    pub id: String,
    /// Human label, informational only
    #[serde(default)]
    pub name: String,
    /// Entries in display order
    #[serde(default)]
    pub widgets: Vec<WidgetRef>,
}

impl Sidebar {
    pub fn new(id: impl Into<String>, name: impl Into<String>, widgets: Vec<WidgetRef>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            widgets,
        }
    }

    /// Whether this is the inactive widgets bucket
    pub fn is_inactive(&self) -> bool {
        is_inactive_id(&self.id)
    }

    /// Whether this is a bucket the host keeps for an unregistered region
    pub fn is_orphaned(&self) -> bool {
        self.id.starts_with(ORPHANED_SIDEBAR_PREFIX)
    }
}

pub fn is_inactive_id(id: &str) -> bool {
    id == INACTIVE_SIDEBAR_ID
}

/// All stored instances of one widget type, keyed by index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetBucket {
    instances: BTreeMap<u32, Settings>,
}

impl WidgetBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u32) -> Option<&Settings> {
        self.instances.get(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.instances.contains_key(&index)
    }

    /// Store settings at an index, returning what was there
    pub fn insert(&mut self, index: u32, settings: Settings) -> Option<Settings> {
        self.instances.insert(index, settings)
    }

    pub fn max_index(&self) -> Option<u32> {
        self.instances.keys().next_back().copied()
    }

    /// The index a new instance gets: one past the highest, never a freed slot
    ///
    /// `None` once the highest index is `u32::MAX`.
    pub fn next_index(&self) -> Option<u32> {
        match self.max_index() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Settings)> {
        self.instances.iter().map(|(index, settings)| (*index, settings))
    }
}

impl FromIterator<(u32, Settings)> for WidgetBucket {
    fn from_iter<I: IntoIterator<Item = (u32, Settings)>>(iter: I) -> Self {
        Self {
            instances: iter.into_iter().collect(),
        }
    }
}

/// Point-in-time copy of the live registry
///
/// A pure value: it holds nothing that refers back to the registry it was
/// read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    /// Every stored sidebar in host order, the inactive bucket included
    pub sidebars: Vec<Sidebar>,
    /// Sidebar ids the host currently registers
    pub registered_sidebars: BTreeSet<String>,
    /// Widget types the host currently registers
    pub widget_types: BTreeSet<String>,
    /// Buckets by widget type
    pub buckets: BTreeMap<String, WidgetBucket>,
}

impl RegistrySnapshot {
    pub fn sidebar(&self, id: &str) -> Option<&Sidebar> {
        self.sidebars.iter().find(|s| s.id == id)
    }

    /// Whether the host registers a region with this id. The inactive bucket always counts.
    pub fn is_sidebar_registered(&self, id: &str) -> bool {
        is_inactive_id(id) || self.registered_sidebars.contains(id)
    }

    pub fn is_widget_type_registered(&self, widget_type: &str) -> bool {
        self.widget_types.contains(widget_type)
    }

    pub fn bucket(&self, widget_type: &str) -> Option<&WidgetBucket> {
        self.buckets.get(widget_type)
    }

    /// Settings of the instance a reference points at
    pub fn settings(&self, widget: &WidgetRef) -> Option<&Settings> {
        match widget {
            WidgetRef::Widget { widget_type, index } => self.bucket(widget_type)?.get(*index),
            WidgetRef::Missing => None,
        }
    }

    /// Resolve a reference into an owned instance
    pub fn instance(&self, widget: &WidgetRef) -> Option<WidgetInstance> {
        let settings = self.settings(widget)?.clone();
        match widget {
            WidgetRef::Widget { widget_type, index } => {
                Some(WidgetInstance::new(widget_type.clone(), *index, settings))
            }
            WidgetRef::Missing => None,
        }
    }
}

/// The portable document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub format_version: u32,
    #[serde(default)]
    pub generator_version: String,
    #[serde(default)]
    pub sidebars: Vec<Sidebar>,
    #[serde(default)]
    pub widgets: Vec<WidgetInstance>,
}

impl ExportDocument {
    pub fn new(generator_version: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generator_version: generator_version.into(),
            sidebars: Vec::new(),
            widgets: Vec::new(),
        }
    }

    pub fn sidebar(&self, id: &str) -> Option<&Sidebar> {
        self.sidebars.iter().find(|s| s.id == id)
    }

    /// Look up widgets by `(type, index)`
    pub fn widget_index(&self) -> HashMap<(&str, u32), &WidgetInstance> {
        self.widgets
            .iter()
            .map(|w| ((w.widget_type.as_str(), w.legacy_index), w))
            .collect()
    }

    /// The instance a reference points at
    pub fn widget(&self, widget: &WidgetRef) -> Option<&WidgetInstance> {
        match widget {
            WidgetRef::Widget { widget_type, index } => self
                .widgets
                .iter()
                .find(|w| w.widget_type == *widget_type && w.legacy_index == *index),
            WidgetRef::Missing => None,
        }
    }
}
