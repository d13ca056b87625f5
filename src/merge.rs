//! Import merge
//!
//! Reconciles a validated document with a registry snapshot and produces a
//! [`WriteBackPlan`]. Merging never deletes anything: live widgets the
//! document no longer places in a sidebar are moved to the inactive bucket.
//!
//! For each selected sidebar, incoming widgets are matched to live widgets
//! of the same sidebar by [`Fingerprint`]. A match keeps the live index, so
//! importing the same document twice changes nothing the second time.
//! Unmatched widgets get a fresh index past the highest one in their
//! bucket; freed indices are never handed out again.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ImportWarning, WriteBackError};
use crate::fingerprint::Fingerprint;
use crate::schema::{
    is_inactive_id, ExportDocument, RegistrySnapshot, Sidebar, WidgetBucket, WidgetInstance,
    WidgetRef, INACTIVE_SIDEBAR_ID,
};

/// Which document sidebars to import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SidebarSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl SidebarSelection {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SidebarSelection::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, sidebar_id: &str) -> bool {
        match self {
            SidebarSelection::All => true,
            SidebarSelection::Only(ids) => ids.contains(sidebar_id),
        }
    }
}

/// Replacement entries for one sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarWrite {
    pub id: String,
    pub widgets: Vec<WidgetRef>,
    /// The sidebar did not exist in the snapshot
    pub created: bool,
}

/// Counts describing a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    pub widgets_created: usize,
    pub widgets_reused: usize,
    pub widgets_moved_to_inactive: usize,
    pub sidebars_created: usize,
}

/// Every mutation an import will make, computed before any is made
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteBackPlan {
    /// New instances by widget type, at their allocated indices
    pub new_instances: BTreeMap<String, WidgetBucket>,
    /// Sidebars whose entries change, in document order, inactive bucket last
    pub sidebars: Vec<SidebarWrite>,
    pub stats: PlanStats,
    pub warnings: Vec<ImportWarning>,
}

impl WriteBackPlan {
    /// Whether applying the plan would write nothing
    pub fn is_empty(&self) -> bool {
        self.new_instances.is_empty() && self.sidebars.is_empty()
    }

    pub fn sidebar(&self, id: &str) -> Option<&SidebarWrite> {
        self.sidebars.iter().find(|s| s.id == id)
    }
}

/// Plan the import of `incoming` into `live`
///
/// `live` must hold the bucket of every widget type the document names,
/// registered or not, so new indices are allocated past the stored ones.
/// Fails with [`WriteBackError::IndexExhausted`] when a type has no index
/// left to hand out.
pub fn merge(
    live: &RegistrySnapshot,
    incoming: &ExportDocument,
    selection: &SidebarSelection,
) -> Result<WriteBackPlan, WriteBackError> {
    let mut planner = Planner::new(live);

    if let SidebarSelection::Only(ids) = selection {
        for id in ids {
            if incoming.sidebar(id).is_none() {
                planner.warn(ImportWarning::SidebarNotInDocument { sidebar: id.clone() });
            }
        }
    }

    let widgets: HashMap<(&str, u32), &WidgetInstance> = incoming.widget_index();
    for sidebar in incoming.sidebars.iter().filter(|s| selection.includes(&s.id)) {
        planner.merge_sidebar(sidebar, &widgets)?;
    }

    let plan = planner.finish();
    info!(
        created = plan.stats.widgets_created,
        reused = plan.stats.widgets_reused,
        moved_to_inactive = plan.stats.widgets_moved_to_inactive,
        sidebars_created = plan.stats.sidebars_created,
        warnings = plan.warnings.len(),
        "import planned"
    );
    Ok(plan)
}

struct Planner<'a> {
    live: &'a RegistrySnapshot,
    /// Next free index per widget type, `None` once exhausted
    next_index: HashMap<String, Option<u32>>,
    plan: WriteBackPlan,
    /// Result of merging the inactive bucket itself, when it was selected
    inactive: Option<Vec<WidgetRef>>,
    /// Live entries displaced from other sidebars
    displaced: Vec<WidgetRef>,
}

impl<'a> Planner<'a> {
    fn new(live: &'a RegistrySnapshot) -> Self {
        Self {
            live,
            next_index: HashMap::new(),
            plan: WriteBackPlan::default(),
            inactive: None,
            displaced: Vec::new(),
        }
    }

    fn warn(&mut self, warning: ImportWarning) {
        if !self.plan.warnings.contains(&warning) {
            self.plan.warnings.push(warning);
        }
    }

    fn allocate(&mut self, widget_type: &str) -> Result<u32, WriteBackError> {
        let live = self.live;
        let next = self
            .next_index
            .entry(widget_type.to_string())
            .or_insert_with(|| live.bucket(widget_type).map_or(Some(1), WidgetBucket::next_index));
        let index = next.ok_or_else(|| WriteBackError::IndexExhausted {
            widget_type: widget_type.to_string(),
        })?;
        *next = index.checked_add(1);
        Ok(index)
    }

    fn merge_sidebar(
        &mut self,
        sidebar: &Sidebar,
        widgets: &HashMap<(&str, u32), &WidgetInstance>,
    ) -> Result<(), WriteBackError> {
        let live = self.live;
        let live_sidebar = live.sidebar(&sidebar.id);
        if !live.is_sidebar_registered(&sidebar.id) {
            self.warn(ImportWarning::SidebarNotRegistered {
                sidebar: sidebar.id.clone(),
            });
        }

        // Live entries of this sidebar that can still be matched
        let mut candidates: Vec<Option<(WidgetRef, Fingerprint)>> = live_sidebar
            .map(|s| s.widgets.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|widget| {
                let instance = live.instance(widget)?;
                Some((widget.clone(), Fingerprint::of_instance(&instance)))
            })
            .collect();

        let mut rebuilt = Vec::with_capacity(sidebar.widgets.len());
        for widget in &sidebar.widgets {
            let WidgetRef::Widget { widget_type, index } = widget else {
                rebuilt.push(WidgetRef::Missing);
                continue;
            };
            let Some(instance) = widgets.get(&(widget_type.as_str(), *index)) else {
                debug!(sidebar = %sidebar.id, widget = %widget, "unresolved entry skipped");
                continue;
            };

            if !live.is_widget_type_registered(widget_type) {
                self.warn(ImportWarning::WidgetTypeNotRegistered {
                    widget_type: widget_type.clone(),
                    sidebar: sidebar.id.clone(),
                });
            }

            let fingerprint = Fingerprint::of_instance(instance);
            let matched = candidates.iter_mut().find(|candidate| {
                matches!(candidate, Some((live_ref, live_fp))
                    if live_ref.widget_type() == Some(widget_type.as_str())
                        && *live_fp == fingerprint)
            });

            match matched.and_then(Option::take) {
                Some((live_ref, _)) => {
                    debug!(
                        sidebar = %sidebar.id,
                        incoming = %widget,
                        live = %live_ref,
                        "matched existing widget"
                    );
                    self.plan.stats.widgets_reused += 1;
                    rebuilt.push(live_ref);
                }
                None => {
                    let new_index = self.allocate(widget_type)?;
                    debug!(
                        sidebar = %sidebar.id,
                        incoming = %widget,
                        index = new_index,
                        "allocated new widget"
                    );
                    self.plan
                        .new_instances
                        .entry(widget_type.clone())
                        .or_default()
                        .insert(new_index, instance.settings.clone());
                    self.plan.stats.widgets_created += 1;
                    rebuilt.push(WidgetRef::widget(widget_type.clone(), new_index));
                }
            }
        }

        let leftovers: Vec<WidgetRef> =
            candidates.into_iter().flatten().map(|(widget, _)| widget).collect();

        if is_inactive_id(&sidebar.id) {
            rebuilt.extend(leftovers);
            self.inactive = Some(rebuilt);
            return Ok(());
        }
        self.displaced.extend(leftovers);

        match live_sidebar {
            None => {
                self.plan.stats.sidebars_created += 1;
                self.plan.sidebars.push(SidebarWrite {
                    id: sidebar.id.clone(),
                    widgets: rebuilt,
                    created: true,
                });
            }
            Some(existing) if existing.widgets != rebuilt => {
                self.plan.sidebars.push(SidebarWrite {
                    id: sidebar.id.clone(),
                    widgets: rebuilt,
                    created: false,
                });
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn finish(mut self) -> WriteBackPlan {
        let live = self.live;
        let live_inactive = live.sidebar(INACTIVE_SIDEBAR_ID);
        let touched = self.inactive.is_some() || !self.displaced.is_empty();

        if touched {
            let mut entries = self
                .inactive
                .take()
                .unwrap_or_else(|| live_inactive.map(|s| s.widgets.clone()).unwrap_or_default());
            for widget in std::mem::take(&mut self.displaced) {
                if !entries.contains(&widget) {
                    entries.push(widget);
                    self.plan.stats.widgets_moved_to_inactive += 1;
                }
            }

            match live_inactive {
                None => {
                    self.plan.stats.sidebars_created += 1;
                    self.plan.sidebars.push(SidebarWrite {
                        id: INACTIVE_SIDEBAR_ID.to_string(),
                        widgets: entries,
                        created: true,
                    });
                }
                Some(existing) if existing.widgets != entries => {
                    self.plan.sidebars.push(SidebarWrite {
                        id: INACTIVE_SIDEBAR_ID.to_string(),
                        widgets: entries,
                        created: false,
                    });
                }
                Some(_) => {}
            }
        }
        self.plan
    }
}
