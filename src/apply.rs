//! Commits write-back plans to a registry

use serde::Serialize;
use tracing::{debug, info};

use crate::error::WriteBackError;
use crate::merge::WriteBackPlan;
use crate::registry::WidgetRegistry;
use crate::schema::WidgetBucket;

/// What an applied import changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub widgets_created: usize,
    pub widgets_reused: usize,
    pub widgets_moved_to_inactive: usize,
    pub sidebars_created: usize,
    pub sidebars_updated: usize,
}

impl Summary {
    /// The summary applying `plan` produces
    pub fn from_plan(plan: &WriteBackPlan) -> Self {
        Self {
            widgets_created: plan.stats.widgets_created,
            widgets_reused: plan.stats.widgets_reused,
            widgets_moved_to_inactive: plan.stats.widgets_moved_to_inactive,
            sidebars_created: plan.stats.sidebars_created,
            sidebars_updated: plan.sidebars.iter().filter(|s| !s.created).count(),
        }
    }
}

/// Writes a plan through the registry collaborator
///
/// Every affected bucket is read once and written once. All reads happen
/// before the first write, so a stale plan is refused with nothing changed.
/// Buckets are written before sidebars so no sidebar ever points at an
/// instance that is not stored yet.
pub struct Applier<'a, R: ?Sized> {
    registry: &'a mut R,
}

impl<'a, R: WidgetRegistry + ?Sized> Applier<'a, R> {
    pub fn new(registry: &'a mut R) -> Self {
        Self { registry }
    }

    pub fn apply(&mut self, plan: &WriteBackPlan) -> Result<Summary, WriteBackError> {
        let summary = Summary::from_plan(plan);
        if plan.is_empty() {
            debug!("empty plan, nothing to write");
            return Ok(summary);
        }

        let staged = self.stage_buckets(plan)?;

        let mut committed: Vec<String> = Vec::new();
        for (widget_type, bucket) in staged {
            let target = format!("widget bucket {}", widget_type);
            self.registry
                .replace_bucket(&widget_type, bucket)
                .map_err(|source| write_failure(&committed, &target, source))?;
            debug!(%target, "written");
            committed.push(target);
        }

        for write in &plan.sidebars {
            let target = format!("sidebar {}", write.id);
            self.registry
                .replace_sidebar(&write.id, write.widgets.clone())
                .map_err(|source| write_failure(&committed, &target, source))?;
            debug!(%target, entries = write.widgets.len(), "written");
            committed.push(target);
        }

        info!(
            created = summary.widgets_created,
            reused = summary.widgets_reused,
            moved_to_inactive = summary.widgets_moved_to_inactive,
            sidebars_created = summary.sidebars_created,
            sidebars_updated = summary.sidebars_updated,
            "import applied"
        );
        Ok(summary)
    }

    /// Read each affected bucket and add the plan's instances to it
    fn stage_buckets(
        &self,
        plan: &WriteBackPlan,
    ) -> Result<Vec<(String, WidgetBucket)>, WriteBackError> {
        let mut staged = Vec::with_capacity(plan.new_instances.len());
        for (widget_type, additions) in &plan.new_instances {
            let mut bucket = self.registry.bucket(widget_type).map_err(WriteBackError::Registry)?;
            for (index, settings) in additions.iter() {
                if bucket.contains(index) {
                    return Err(WriteBackError::IndexConflict {
                        widget_type: widget_type.clone(),
                        index,
                    });
                }
                bucket.insert(index, settings.clone());
            }
            staged.push((widget_type.clone(), bucket));
        }
        Ok(staged)
    }
}

fn write_failure(
    committed: &[String],
    target: &str,
    source: crate::error::RegistryError,
) -> WriteBackError {
    if committed.is_empty() {
        WriteBackError::Registry(source)
    } else {
        WriteBackError::Partial {
            committed: committed.to_vec(),
            failed: target.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::merge::{PlanStats, SidebarWrite};
    use crate::registry::{MemoryRegistry, SidebarInfo};
    use crate::schema::{Settings, WidgetRef};
    use serde_json::json;

    fn settings(title: &str) -> Settings {
        json!({ "title": title }).as_object().cloned().unwrap()
    }

    /// Passes reads through and rejects writes to one target
    struct RejectingRegistry {
        inner: MemoryRegistry,
        reject: &'static str,
    }

    impl WidgetRegistry for RejectingRegistry {
        fn sidebars(&self) -> Result<Vec<SidebarInfo>, RegistryError> {
            self.inner.sidebars()
        }

        fn sidebar_widgets(&self, sidebar_id: &str) -> Result<Vec<WidgetRef>, RegistryError> {
            self.inner.sidebar_widgets(sidebar_id)
        }

        fn widget_types(&self) -> Result<Vec<String>, RegistryError> {
            self.inner.widget_types()
        }

        fn bucket(&self, widget_type: &str) -> Result<WidgetBucket, RegistryError> {
            self.inner.bucket(widget_type)
        }

        fn replace_bucket(
            &mut self,
            widget_type: &str,
            bucket: WidgetBucket,
        ) -> Result<(), RegistryError> {
            if widget_type == self.reject {
                return Err(RegistryError::Rejected {
                    target: widget_type.to_string(),
                    reason: "read only".to_string(),
                });
            }
            self.inner.replace_bucket(widget_type, bucket)
        }

        fn replace_sidebar(
            &mut self,
            sidebar_id: &str,
            widgets: Vec<WidgetRef>,
        ) -> Result<(), RegistryError> {
            if sidebar_id == self.reject {
                return Err(RegistryError::Rejected {
                    target: sidebar_id.to_string(),
                    reason: "read only".to_string(),
                });
            }
            self.inner.replace_sidebar(sidebar_id, widgets)
        }
    }

    fn plan_adding_text_4() -> WriteBackPlan {
        let mut additions = WidgetBucket::new();
        additions.insert(4, settings("New"));
        WriteBackPlan {
            new_instances: [("text".to_string(), additions)].into_iter().collect(),
            sidebars: vec![SidebarWrite {
                id: "sidebar-1".to_string(),
                widgets: vec![WidgetRef::widget("text", 1), WidgetRef::widget("text", 4)],
                created: false,
            }],
            stats: PlanStats {
                widgets_created: 1,
                widgets_reused: 1,
                ..PlanStats::default()
            },
            warnings: Vec::new(),
        }
    }

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.register_sidebar("sidebar-1", "Main");
        registry.add_widget("sidebar-1", "text", settings("A"));
        registry
    }

    #[test]
    fn test_apply_preserves_other_instances() {
        let mut registry = registry();
        // An unrelated instance stored after the plan was computed.
        registry.add_widget("footer-1", "text", settings("Concurrent"));
        assert_eq!(registry.widgets_in("footer-1"), &[WidgetRef::widget("text", 2)]);

        let summary = Applier::new(&mut registry).apply(&plan_adding_text_4()).unwrap();
        assert_eq!(summary.widgets_created, 1);
        assert_eq!(summary.sidebars_updated, 1);
        assert!(registry.settings(&WidgetRef::widget("text", 2)).is_some());
        assert_eq!(registry.settings(&WidgetRef::widget("text", 4)), Some(&settings("New")));
        assert_eq!(
            registry.widgets_in("sidebar-1"),
            &[WidgetRef::widget("text", 1), WidgetRef::widget("text", 4)]
        );
    }

    #[test]
    fn test_stale_plan_is_refused_before_writing() {
        let mut registry = registry();
        registry.add_widget("footer-1", "text", settings("x"));
        registry.add_widget("footer-1", "text", settings("y"));
        registry.add_widget("footer-1", "text", settings("z"));
        let before = registry.clone();

        let err = Applier::new(&mut registry).apply(&plan_adding_text_4()).unwrap_err();
        assert_eq!(
            err,
            WriteBackError::IndexConflict {
                widget_type: "text".to_string(),
                index: 4
            }
        );
        assert_eq!(registry, before);
    }

    #[test]
    fn test_partial_failure_is_reported() {
        let mut registry = RejectingRegistry {
            inner: registry(),
            reject: "sidebar-1",
        };
        let err = Applier::new(&mut registry).apply(&plan_adding_text_4()).unwrap_err();
        match err {
            WriteBackError::Partial { committed, failed, .. } => {
                assert_eq!(committed, vec!["widget bucket text".to_string()]);
                assert_eq!(failed, "sidebar sidebar-1");
            }
            other => panic!("expected Partial, got {:?}", other),
        }
    }

    #[test]
    fn test_first_write_failure_commits_nothing() {
        let mut registry = RejectingRegistry {
            inner: registry(),
            reject: "text",
        };
        let err = Applier::new(&mut registry).apply(&plan_adding_text_4()).unwrap_err();
        assert!(matches!(err, WriteBackError::Registry(RegistryError::Rejected { .. })));
    }

    #[test]
    fn test_empty_plan_writes_nothing() {
        let mut registry = registry();
        let before = registry.clone();
        let summary = Applier::new(&mut registry).apply(&WriteBackPlan::default()).unwrap();
        assert_eq!(summary, Summary::default());
        assert_eq!(registry, before);
    }
}
