//! Export/Import Behaviour Tests
//!
//! Runs whole export and import cycles against a reference site loaded from
//! fixtures.

use serde_json::json;
use tempfile::tempdir;

use widget_transfer::schema::INACTIVE_SIDEBAR_ID;
use widget_transfer::{
    ImportWarning, MemoryRegistry, RegistryState, Settings, SidebarSelection, TransferError,
    ValidationError, WidgetRef, WidgetTransfer,
};

fn site() -> MemoryRegistry {
    let state: RegistryState =
        serde_json::from_str(include_str!("fixtures/site_state.json")).unwrap();
    MemoryRegistry::from_state(state)
}

fn settings(value: serde_json::Value) -> Settings {
    value.as_object().cloned().unwrap()
}

fn refs(ids: &[&str]) -> Vec<WidgetRef> {
    ids.iter().map(|id| WidgetRef::parse(id).unwrap()).collect()
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_reimporting_an_export_changes_nothing() {
    let mut transfer = WidgetTransfer::new(site());
    let bytes = transfer.export().unwrap();

    let plan = transfer
        .plan_import(&bytes, "application/json", &SidebarSelection::All)
        .unwrap();
    assert_eq!(plan.stats.widgets_created, 0);
    assert_eq!(plan.stats.widgets_moved_to_inactive, 0);
    assert!(plan.is_empty());

    let outcome = transfer.import(&bytes, "application/json", &SidebarSelection::All).unwrap();
    assert_eq!(outcome.summary.widgets_reused, 5);
    assert!(outcome.warnings.is_empty());
    assert_eq!(transfer.registry(), &site());
}

#[test]
fn test_export_is_deterministic() {
    let first = WidgetTransfer::new(site()).export().unwrap();
    let second = WidgetTransfer::new(site()).export().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_import_into_empty_site_keeps_order() {
    let bytes = WidgetTransfer::new(site()).export().unwrap();

    let mut target = MemoryRegistry::new();
    target
        .register_sidebar("sidebar-1", "Main Sidebar")
        .register_sidebar("footer-1", "Footer")
        .register_widget_type("search")
        .register_widget_type("text")
        .register_widget_type("recent-posts");
    let mut transfer = WidgetTransfer::new(target);

    let outcome = transfer.import(&bytes, "application/json", &SidebarSelection::All).unwrap();
    assert_eq!(outcome.summary.widgets_created, 5);
    assert_eq!(outcome.summary.sidebars_created, 1);
    assert!(outcome.warnings.is_empty());

    let registry = transfer.registry();
    assert_eq!(registry.widgets_in("sidebar-1"), refs(&["search-1", "text-1", "recent-posts-1"]));
    assert_eq!(registry.widgets_in("footer-1"), refs(&["text-2"]));
    assert_eq!(registry.widgets_in(INACTIVE_SIDEBAR_ID), refs(&["text-3"]));
    assert_eq!(
        registry.settings(&WidgetRef::widget("text", 1)),
        Some(&settings(json!({ "filter": true, "text": "Written by a person.", "title": "About" })))
    );

    // The copy now round-trips on its own.
    let again = transfer.export().unwrap();
    let plan = transfer
        .plan_import(&again, "application/json", &SidebarSelection::All)
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_reordered_sidebar_reuses_instances() {
    let doc = json!({
        "formatVersion": 1,
        "sidebars": [
            { "id": "sidebar-1", "widgets": ["recent-posts-9", "search-9", "text-9"] }
        ],
        "widgets": [
            { "type": "search", "index": 9, "settings": { "title": "" } },
            {
                "type": "text",
                "index": 9,
                "settings": { "title": "About", "text": "Written by a person.", "filter": true }
            },
            {
                "type": "recent-posts",
                "index": 9,
                "settings": { "show_date": false, "number": 5, "title": "Latest" }
            }
        ]
    });
    let mut transfer = WidgetTransfer::new(site());
    let outcome = transfer
        .import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap();

    assert_eq!(outcome.summary.widgets_created, 0);
    assert_eq!(outcome.summary.sidebars_updated, 1);
    assert_eq!(
        transfer.registry().widgets_in("sidebar-1"),
        refs(&["recent-posts-2", "search-2", "text-3"])
    );
}

// =============================================================================
// Merge Behaviour
// =============================================================================

#[test]
fn test_dropped_widgets_move_to_inactive() {
    let doc = json!({
        "formatVersion": 1,
        "sidebars": [{ "id": "sidebar-1", "widgets": ["search-2"] }],
        "widgets": [{ "type": "search", "index": 2, "settings": { "title": "" } }]
    });
    let mut transfer = WidgetTransfer::new(site());
    let outcome = transfer
        .import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap();

    assert_eq!(outcome.summary.widgets_moved_to_inactive, 2);
    let registry = transfer.registry();
    assert_eq!(registry.widgets_in("sidebar-1"), refs(&["search-2"]));
    assert_eq!(
        registry.widgets_in(INACTIVE_SIDEBAR_ID),
        refs(&["text-1", "text-3", "recent-posts-2"])
    );
    assert!(registry.settings(&WidgetRef::widget("text", 3)).is_some());
    // Sidebars the document does not mention are left alone.
    assert_eq!(registry.widgets_in("footer-1"), refs(&["text-5"]));
}

#[test]
fn test_new_index_skips_freed_slots() {
    let mut registry = MemoryRegistry::new();
    registry.register_sidebar("sidebar-1", "Main").register_widget_type("text");
    let mut bucket = widget_transfer::schema::WidgetBucket::new();
    bucket.insert(1, settings(json!({ "title": "One" })));
    bucket.insert(3, settings(json!({ "title": "Three" })));
    widget_transfer::WidgetRegistry::replace_bucket(&mut registry, "text", bucket).unwrap();

    let doc = json!({
        "formatVersion": 1,
        "sidebars": [{ "id": "sidebar-1", "widgets": ["text-2"] }],
        "widgets": [{ "type": "text", "index": 2, "settings": { "title": "New" } }]
    });
    let mut transfer = WidgetTransfer::new(registry);
    transfer
        .import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap();

    let registry = transfer.registry();
    assert_eq!(registry.widgets_in("sidebar-1"), refs(&["text-4"]));
    assert!(registry.settings(&WidgetRef::widget("text", 2)).is_none());
    assert_eq!(registry.state().buckets["text"].len(), 3);
}

#[test]
fn test_missing_placeholders_survive_import() {
    let doc = json!({
        "formatVersion": 1,
        "sidebars": [{ "id": "footer-1", "widgets": ["missing-widget", "text-5"] }],
        "widgets": [{
            "type": "text",
            "index": 5,
            "settings": { "title": "Contact", "text": "mail@example.org", "filter": false }
        }]
    });
    let mut transfer = WidgetTransfer::new(site());
    transfer
        .import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap();
    assert_eq!(
        transfer.registry().widgets_in("footer-1"),
        vec![WidgetRef::Missing, WidgetRef::widget("text", 5)]
    );
}

#[test]
fn test_selection_limits_import() {
    let doc = json!({
        "formatVersion": 1,
        "sidebars": [
            { "id": "sidebar-1", "widgets": [] },
            { "id": "footer-1", "widgets": ["text-1"] }
        ],
        "widgets": [{ "type": "text", "index": 1, "settings": { "title": "Replaced" } }]
    });
    let mut transfer = WidgetTransfer::new(site());
    let outcome = transfer
        .import(
            doc.to_string().as_bytes(),
            "application/json",
            &SidebarSelection::only(["footer-1"]),
        )
        .unwrap();

    assert_eq!(outcome.summary.widgets_created, 1);
    let registry = transfer.registry();
    assert_eq!(registry.widgets_in("sidebar-1"), site().widgets_in("sidebar-1"));
    assert_eq!(registry.widgets_in("footer-1"), refs(&["text-6"]));
    assert_eq!(registry.widgets_in(INACTIVE_SIDEBAR_ID), refs(&["text-1", "text-5"]));
}

// =============================================================================
// Legacy Documents
// =============================================================================

#[test]
fn test_legacy_document_import() {
    let bytes = include_bytes!("fixtures/legacy.wie");
    let mut transfer = WidgetTransfer::new(site());
    let outcome = transfer.import(bytes, "text/plain", &SidebarSelection::All).unwrap();

    assert_eq!(outcome.summary.widgets_reused, 2);
    assert_eq!(outcome.summary.widgets_created, 1);
    assert_eq!(outcome.summary.widgets_moved_to_inactive, 2);
    assert_eq!(outcome.summary.sidebars_created, 1);
    assert_eq!(
        outcome.warnings,
        vec![ImportWarning::SidebarNotRegistered {
            sidebar: "header-2".to_string()
        }]
    );

    let registry = transfer.registry();
    assert_eq!(registry.widgets_in("sidebar-1"), refs(&["search-2", "text-3"]));
    assert_eq!(registry.widgets_in("footer-1"), refs(&["text-6"]));
    assert!(registry.widgets_in("header-2").is_empty());
    assert_eq!(
        registry.widgets_in(INACTIVE_SIDEBAR_ID),
        refs(&["text-1", "recent-posts-2", "text-5"])
    );
}

// =============================================================================
// Rejected Documents
// =============================================================================

#[test]
fn test_dangling_reference_rejected_without_writes() {
    let doc = json!({
        "formatVersion": 1,
        "sidebars": [{ "id": "sidebar-1", "widgets": ["text-99"] }],
        "widgets": []
    });
    let mut transfer = WidgetTransfer::new(site());
    let err = transfer
        .import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap_err();

    match err {
        TransferError::Validation(ValidationError::DanglingReference { sidebar, widget }) => {
            assert_eq!(sidebar, "sidebar-1");
            assert_eq!(widget, "text-99");
        }
        other => panic!("expected DanglingReference, got {:?}", other),
    }
    assert_eq!(transfer.registry(), &site());
}

#[test]
fn test_disallowed_mime_type_rejected() {
    let bytes = WidgetTransfer::new(site()).export().unwrap();
    let mut transfer = WidgetTransfer::new(site());

    let err = transfer
        .import(&bytes, "application/x-php", &SidebarSelection::All)
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::Validation(ValidationError::UntrustedContent(_))
    ));
    assert_eq!(transfer.registry(), &site());

    // Case and parameters do not matter.
    transfer
        .import(&bytes, "Application/JSON; charset=utf-8", &SidebarSelection::All)
        .unwrap();
}

#[test]
fn test_newer_format_version_rejected() {
    let doc = json!({ "formatVersion": 2, "sidebars": [], "widgets": [] });
    let transfer = WidgetTransfer::new(site());
    let err = transfer
        .plan_import(doc.to_string().as_bytes(), "application/json", &SidebarSelection::All)
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::Validation(ValidationError::UnsupportedFormatVersion {
            found: 2,
            supported: 1
        })
    ));
}

// =============================================================================
// State Files
// =============================================================================

#[test]
fn test_state_file_survives_import() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("site.json");
    site().state().save(&path).unwrap();

    let bytes = include_bytes!("fixtures/legacy.wie");
    let state = RegistryState::load(&path).unwrap();
    let mut transfer = WidgetTransfer::new(MemoryRegistry::from_state(state));
    transfer.import(bytes, "text/plain", &SidebarSelection::All).unwrap();
    transfer.into_registry().into_state().save(&path).unwrap();

    let state = RegistryState::load(&path).unwrap();
    let reloaded = WidgetTransfer::new(MemoryRegistry::from_state(state));
    let plan = reloaded.plan_import(bytes, "text/plain", &SidebarSelection::All).unwrap();
    assert!(plan.is_empty());
}
