use partview_core::{
    parse_stored_model_json, Aabb, EventBus, EventFilter, EventType, Model, ModelFormat, Section,
    SectionRegistry, StateStore, Transform, ViewerError,
};

fn load_fixture(name: &str) -> (EventBus, StateStore, SectionRegistry) {
    let json = partview_test_fixtures::models::json(name).unwrap();
    let (model, sections) = parse_stored_model_json(&json).unwrap();
    let mut bus = EventBus::with_history(Some(64));
    let mut store = StateStore::new(50);
    let mut registry = SectionRegistry::new();
    registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap();
    (bus, store, registry)
}

fn section(id: &str, parent: Option<&str>, children: &[&str]) -> Section {
    Section {
        id: id.to_string(),
        parent_id: parent.map(str::to_string),
        child_ids: children.iter().map(|c| c.to_string()).collect(),
        name: id.to_string(),
        rest_transform: Transform::IDENTITY,
        bounds: Aabb::point([0.0, 0.0, 0.0]),
    }
}

fn model_for(sections: &[Section]) -> Model {
    Model {
        id: "m".to_string(),
        format: ModelFormat::Gltf,
        section_ids: sections.iter().map(|s| s.id.clone()).collect(),
        created_at_ms: 0,
    }
}

#[test]
fn test_hierarchy_navigation() {
    let (_bus, _store, registry) = load_fixture("gearbox");

    let root_ids: Vec<&str> = registry.roots().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(root_ids, ["housing", "shaft"]);

    let children: Vec<&str> = registry
        .children("housing")
        .unwrap()
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(children, ["casing", "geartrain"]);

    let parent = registry.parent("gear-primary").unwrap().unwrap();
    assert_eq!(parent.id, "geartrain");
    assert!(registry.parent("housing").unwrap().is_none());

    assert_eq!(
        registry.with_descendants("housing").unwrap(),
        ["housing", "casing", "geartrain", "gear-primary", "gear-secondary"]
    );

    assert!(matches!(
        registry.section("flux-capacitor"),
        Err(ViewerError::SectionNotFound { .. })
    ));
}

#[test]
fn test_selection_replace_and_accumulate() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");

    registry
        .select_section(&mut store, &mut bus, "a", false)
        .unwrap();
    registry
        .select_section(&mut store, &mut bus, "b", false)
        .unwrap();
    let selected = store.state().sections.selected.clone();
    assert_eq!(selected.len(), 1);
    assert!(selected.contains("b"));

    registry
        .select_section(&mut store, &mut bus, "a", true)
        .unwrap();
    let selected = store.state().sections.selected.clone();
    assert_eq!(selected.len(), 2);
    assert!(selected.contains("a") && selected.contains("b"));

    // Re-selecting an already-selected section leaves the set alone but
    // still announces the click.
    let state_before = store.state();
    registry
        .select_section(&mut store, &mut bus, "a", true)
        .unwrap();
    assert_eq!(store.state(), state_before);
    let selects = bus.recent(&EventFilter {
        event_type: Some(EventType::SectionSelect),
        ..Default::default()
    });
    assert_eq!(selects.len(), 4);
}

#[test]
fn test_deselect_semantics() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");

    registry
        .select_section(&mut store, &mut bus, "a", false)
        .unwrap();
    registry
        .deselect_section(&mut store, &mut bus, "a")
        .unwrap();
    assert!(store.state().sections.selected.is_empty());

    // Known but not selected: published no-op.
    registry
        .deselect_section(&mut store, &mut bus, "b")
        .unwrap();
    let deselects = bus.recent(&EventFilter {
        event_type: Some(EventType::SectionDeselect),
        ..Default::default()
    });
    assert_eq!(deselects.len(), 2);

    // Unknown id is an error.
    assert!(matches!(
        registry.deselect_section(&mut store, &mut bus, "nope"),
        Err(ViewerError::SectionNotFound { .. })
    ));
}

#[test]
fn test_isolation_is_independent_of_selection() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");

    registry
        .select_section(&mut store, &mut bus, "a", false)
        .unwrap();
    registry
        .isolate_sections(&mut store, &mut bus, &["b".to_string()])
        .unwrap();

    let state = store.state();
    assert!(state.sections.selected.contains("a"));
    let isolated = state.sections.isolated.as_ref().unwrap();
    assert_eq!(isolated.len(), 1);
    assert!(isolated.contains("b"));

    registry.show_all_sections(&mut store, &mut bus);
    let state = store.state();
    assert!(state.sections.isolated.is_none());
    assert!(state.sections.selected.contains("a"));

    // show-all announces an empty isolation set.
    let isolates = bus.recent(&EventFilter {
        event_type: Some(EventType::SectionIsolate),
        ..Default::default()
    });
    assert_eq!(isolates.len(), 2);
    assert_eq!(
        isolates[1].payload,
        partview_core::EventPayload::SectionIsolate {
            section_ids: Vec::new()
        }
    );
}

#[test]
fn test_reload_resets_interaction_state() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");
    registry
        .select_section(&mut store, &mut bus, "a", false)
        .unwrap();
    registry
        .isolate_sections(&mut store, &mut bus, &["b".to_string()])
        .unwrap();

    let json = partview_test_fixtures::models::json("gearbox").unwrap();
    let (model, sections) = parse_stored_model_json(&json).unwrap();
    registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap();

    let state = store.state();
    assert_eq!(state.models.active.as_deref(), Some("gearbox"));
    assert!(state.sections.selected.is_empty());
    assert!(state.sections.isolated.is_none());
    // The arena now indexes the new model only.
    assert!(registry.section("a").is_err());
    assert!(registry.section("shaft").is_ok());

    // The superseded model is destroyed, not retained.
    assert_eq!(state.models.items.len(), 1);
    assert!(state.models.items.contains_key("gearbox"));
    assert_eq!(registry.active_model().unwrap().id, "gearbox");
}

#[test]
fn test_load_starts_a_fresh_history() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");
    assert_eq!(store.history_len(), 0);

    registry
        .select_section(&mut store, &mut bus, "a", false)
        .unwrap();
    assert_eq!(store.history_len(), 1);

    let json = partview_test_fixtures::models::json("gearbox").unwrap();
    let (model, sections) = parse_stored_model_json(&json).unwrap();
    registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap();

    assert_eq!(store.history_len(), 0);
    assert!(matches!(
        store.undo(&mut bus),
        Err(ViewerError::NoHistory)
    ));
}

#[test]
fn test_highlight_is_transient() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");
    let history_before = store.history_len();

    registry.highlight_section(&mut bus, "a", true).unwrap();
    assert!(registry.is_highlighted("a"));
    registry.highlight_section(&mut bus, "a", false).unwrap();
    assert!(!registry.is_highlighted("a"));

    assert_eq!(store.history_len(), history_before);
    let on = bus.recent(&EventFilter {
        event_type: Some(EventType::SectionHighlight),
        ..Default::default()
    });
    let off = bus.recent(&EventFilter {
        event_type: Some(EventType::SectionDehighlight),
        ..Default::default()
    });
    assert_eq!((on.len(), off.len()), (1, 1));
}

#[test]
fn test_rejects_duplicate_section_ids() {
    let sections = vec![section("a", None, &[]), section("a", None, &[])];
    let mut model = model_for(&sections);
    model.section_ids = vec!["a".to_string(), "a".to_string()];

    let mut bus = EventBus::new();
    let mut store = StateStore::new(8);
    let mut registry = SectionRegistry::new();
    let err = registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap_err();
    assert!(matches!(err, ViewerError::InvalidHierarchy { .. }));
}

#[test]
fn test_rejects_missing_parent() {
    let sections = vec![section("a", Some("ghost"), &[])];
    let model = model_for(&sections);

    let mut bus = EventBus::new();
    let mut store = StateStore::new(8);
    let mut registry = SectionRegistry::new();
    let err = registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap_err();
    assert!(matches!(err, ViewerError::InvalidHierarchy { .. }));
}

#[test]
fn test_rejects_parent_without_back_edge() {
    // b claims parent a, but a does not list b as a child.
    let sections = vec![section("a", None, &[]), section("b", Some("a"), &[])];
    let model = model_for(&sections);

    let mut bus = EventBus::new();
    let mut store = StateStore::new(8);
    let mut registry = SectionRegistry::new();
    let err = registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap_err();
    assert!(matches!(err, ViewerError::InvalidHierarchy { .. }));
}

#[test]
fn test_rejects_parent_cycle() {
    let sections = vec![
        section("a", Some("b"), &["b"]),
        section("b", Some("a"), &["a"]),
    ];
    let model = model_for(&sections);

    let mut bus = EventBus::new();
    let mut store = StateStore::new(8);
    let mut registry = SectionRegistry::new();
    let err = registry
        .load_model(&mut store, &mut bus, model, sections)
        .unwrap_err();
    assert!(matches!(err, ViewerError::InvalidHierarchy { .. }));
}

#[test]
fn test_failed_load_leaves_registry_untouched() {
    let (mut bus, mut store, mut registry) = load_fixture("simple-assembly");
    let state_before = store.state();
    let count_before = registry.section_count();

    let bad = vec![section("x", Some("ghost"), &[])];
    let model = model_for(&bad);
    assert!(registry
        .load_model(&mut store, &mut bus, model, bad)
        .is_err());

    assert_eq!(registry.section_count(), count_before);
    assert_eq!(store.state(), state_before);
    assert!(registry.section("a").is_ok());
}
