use std::sync::Arc;
use syncline_core::{
    engine, EngineConfig, EntityId, EntityStore, FieldMap, FieldValue, HookKind, LifecycleEvent,
    MemoryStore, Record,
};

fn fields(entries: &[(&str, FieldValue)]) -> FieldMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn record_event(collection: &str, kind: HookKind, entries: &[(&str, FieldValue)]) -> LifecycleEvent {
    LifecycleEvent::new(collection, kind).with_result(FieldValue::Object(fields(entries)))
}

fn status(store: &MemoryStore, id: i64) -> Option<String> {
    store
        .find_one("lists", &EntityId::Int(id), &["status"])
        .unwrap()
        .and_then(|list| list.text("status").map(str::to_string))
}

#[test]
fn list_status_follows_the_version_lifecycle_through_hooks() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    // New list, no versions yet.
    store.insert("lists", Record::new(1, FieldMap::new()));
    let mut created = record_event("lists", HookKind::AfterCreate, &[("id", FieldValue::Int(1))]);
    assert_eq!(registry.dispatch(&mut created).invoked, 1);
    assert_eq!(status(&store, 1).as_deref(), Some("no_versions"));

    // First draft version appears.
    store.insert(
        "versions",
        Record::new(
            10,
            fields(&[
                ("list", FieldValue::Int(1)),
                ("state", FieldValue::from("draft")),
            ]),
        ),
    );
    let mut version_created = record_event(
        "versions",
        HookKind::AfterCreate,
        &[("id", FieldValue::Int(10)), ("list", FieldValue::Int(1))],
    );
    registry.dispatch(&mut version_created);
    assert_eq!(status(&store, 1).as_deref(), Some("in_progress"));

    // A published version becomes current.
    store.insert(
        "versions",
        Record::new(
            20,
            fields(&[
                ("list", FieldValue::Int(1)),
                ("state", FieldValue::from("published")),
            ]),
        ),
    );
    store
        .update_one(
            "lists",
            &EntityId::Int(1),
            &fields(&[("current_version", FieldValue::Int(20))]),
        )
        .unwrap();
    let mut list_updated =
        record_event("lists", HookKind::AfterUpdate, &[("id", FieldValue::Int(1))]);
    registry.dispatch(&mut list_updated);
    assert_eq!(status(&store, 1).as_deref(), Some("published"));

    // The published version goes away again.
    store.delete("versions", &EntityId::Int(20));
    store
        .update_one(
            "lists",
            &EntityId::Int(1),
            &fields(&[("current_version", FieldValue::Null)]),
        )
        .unwrap();
    let mut version_deleted = record_event(
        "versions",
        HookKind::AfterDelete,
        &[("id", FieldValue::Int(20)), ("list", FieldValue::Int(1))],
    );
    registry.dispatch(&mut version_deleted);
    assert_eq!(status(&store, 1).as_deref(), Some("in_progress"));

    // The last version goes away too.
    store.delete("versions", &EntityId::Int(10));
    let mut last_deleted = record_event(
        "versions",
        HookKind::AfterDelete,
        &[("id", FieldValue::Int(10)), ("list", FieldValue::Int(1))],
    );
    registry.dispatch(&mut last_deleted);
    assert_eq!(status(&store, 1).as_deref(), Some("no_versions"));
}

#[test]
fn bulk_version_events_are_routed() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    store.insert("lists", Record::new(1, FieldMap::new()));
    store.insert(
        "versions",
        Record::new(
            10,
            fields(&[
                ("list", FieldValue::Int(1)),
                ("state", FieldValue::from("draft")),
            ]),
        ),
    );

    let mut event = LifecycleEvent::new("versions", HookKind::AfterCreateMany).with_result(
        FieldValue::array([FieldValue::object([
            ("id", FieldValue::Int(10)),
            ("list", FieldValue::Int(1)),
        ])]),
    );
    assert_eq!(registry.dispatch(&mut event).invoked, 1);
    assert_eq!(status(&store, 1).as_deref(), Some("in_progress"));
}

#[test]
fn assignment_updates_propagate_through_hooks() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    let assignment = |priority: i64, order: i64| {
        fields(&[
            ("role", FieldValue::from("sales")),
            ("period", FieldValue::Int(4)),
            ("site", FieldValue::Int(2)),
            ("is_current", FieldValue::Bool(true)),
            ("priority", FieldValue::Int(priority)),
            ("order", FieldValue::Int(order)),
        ])
    };
    store.insert("assignments", Record::new(1, assignment(5, 1)));
    store.insert("assignments", Record::new(2, assignment(2, 1)));

    let mut event = LifecycleEvent::new("assignments", HookKind::AfterUpdate)
        .with_result(FieldValue::object([("id", FieldValue::Int(1))]))
        .with_snapshot(fields(&[
            ("priority", FieldValue::Int(2)),
            ("order", FieldValue::Int(1)),
        ]));
    assert_eq!(registry.dispatch(&mut event).invoked, 1);

    let sibling = store
        .find_one("assignments", &EntityId::Int(2), &["priority"])
        .unwrap()
        .unwrap();
    assert_eq!(sibling.get("priority"), Some(&FieldValue::Int(5)));
}

#[test]
fn course_link_before_hooks_rewrite_the_payload_in_place() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    store.insert(
        "courses",
        Record::new(
            7,
            fields(&[
                ("year", FieldValue::Int(2024)),
                ("letter", FieldValue::from("B")),
            ]),
        ),
    );

    let mut event = LifecycleEvent::new("course_subjects", HookKind::BeforeCreate).with_data(
        fields(&[
            ("course", FieldValue::Int(7)),
            ("subject", FieldValue::Int(21)),
            ("group", FieldValue::from("Morning")),
        ]),
    );
    assert_eq!(registry.dispatch(&mut event).invoked, 1);

    let data = event.data.as_ref().and_then(FieldValue::as_object).unwrap();
    assert_eq!(data.get("year"), Some(&FieldValue::Int(2024)));
    assert_eq!(
        data.get("fingerprint"),
        Some(&FieldValue::from("7|21|2024|morning"))
    );
}

#[test]
fn validation_failures_are_contained_by_the_registry() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    // Missing subject relation: the hook reports a failure, the dispatch
    // itself does not error and later processing is unaffected.
    let mut event = LifecycleEvent::new("course_subjects", HookKind::BeforeCreate)
        .with_data(fields(&[("course", FieldValue::Int(7))]));
    let outcome = registry.dispatch(&mut event);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.invoked, 0);
}

#[test]
fn unrelated_collections_have_no_handlers() {
    let store = Arc::new(MemoryStore::new());
    let registry = engine(Arc::clone(&store), EngineConfig::default());

    let mut event = LifecycleEvent::new("articles", HookKind::AfterCreate)
        .with_result(FieldValue::object([("id", FieldValue::Int(1))]));
    let outcome = registry.dispatch(&mut event);
    assert_eq!(outcome.invoked, 0);
    assert_eq!(outcome.failed, 0);
}
