use mainctx_core::{
    AttributeValue, ContextError, MainContext, ManagedRecord, StoreConfig,
};
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "version": 1,
    "entities": [
        {"name": "note", "attributes": {"title": "text", "stars": "integer"}}
    ]
}"#;

fn store_dir() -> TempDir {
    TempDir::new().expect("temp dir should be creatable")
}

#[test]
fn save_clears_pending_changes() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let mut note = ManagedRecord::new("note");
    note.set("title", AttributeValue::Text("draft".to_string()));
    context.insert(note).unwrap();
    assert!(context.has_pending_changes());

    context.save().unwrap();
    assert!(!context.has_pending_changes());
    assert_eq!(context.pending_change_count(), 0);
}

#[test]
fn save_with_nothing_staged_is_an_empty_noop() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();
    let notification = context.save().unwrap();
    assert!(notification.is_empty());
}

#[test]
fn saved_changes_survive_reopening_the_store_file() {
    let dir = store_dir();
    let path = dir.path().join("notes.sqlite3");

    let id = {
        let context = MainContext::open(StoreConfig::on_disk(&path, SCHEMA)).unwrap();
        let mut note = ManagedRecord::new("note");
        note.set("title", AttributeValue::Text("persisted".to_string()));
        note.set("stars", AttributeValue::Integer(4));
        let id = context.insert(note).unwrap();
        context.save().unwrap();
        id
    };

    let reopened = MainContext::open(StoreConfig::on_disk(&path, SCHEMA)).unwrap();
    let loaded = reopened.fetch("note", id).unwrap().unwrap();
    assert_eq!(
        loaded.get("title"),
        Some(&AttributeValue::Text("persisted".to_string()))
    );
    assert_eq!(loaded.get("stars"), Some(&AttributeValue::Integer(4)));
}

#[test]
fn save_returns_notification_describing_the_commit() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let mut first = ManagedRecord::new("note");
    first.set("title", AttributeValue::Text("one".to_string()));
    let first_id = context.insert(first).unwrap();
    context.save().unwrap();

    let mut second = ManagedRecord::new("note");
    second.set("title", AttributeValue::Text("two".to_string()));
    context.insert(second).unwrap();

    let mut edited = context.fetch("note", first_id).unwrap().unwrap();
    edited.set("stars", AttributeValue::Integer(5));
    context.update(edited).unwrap();

    let notification = context.save().unwrap();
    assert_eq!(notification.inserted.len(), 1);
    assert_eq!(notification.updated.len(), 1);
    assert!(notification.deleted.is_empty());
    assert_eq!(notification.updated[0].id, first_id);
}

#[test]
fn staged_delete_is_persisted_by_save() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let note = ManagedRecord::new("note");
    let id = context.insert(note).unwrap();
    context.save().unwrap();
    assert_eq!(context.persisted_count("note").unwrap(), 1);

    context.delete_object("note", id).unwrap();
    assert!(context.fetch("note", id).unwrap().is_none());

    let notification = context.save().unwrap();
    assert_eq!(notification.deleted.len(), 1);
    assert_eq!(context.persisted_count("note").unwrap(), 0);
}

#[test]
fn deleting_an_unsaved_insert_cancels_it() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let note = ManagedRecord::new("note");
    let id = context.insert(note).unwrap();
    context.delete_object("note", id).unwrap();

    assert!(!context.has_pending_changes());
    let notification = context.save().unwrap();
    assert!(notification.is_empty());
}

#[test]
fn insert_rejects_an_already_known_id() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let note = ManagedRecord::new("note");
    let duplicate = note.clone();
    context.insert(note).unwrap();

    let err = context.insert(duplicate).unwrap_err();
    assert!(matches!(err, ContextError::ObjectAlreadyExists(_)));
}

#[test]
fn update_of_an_unknown_object_is_not_found() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let ghost = ManagedRecord::new("note");
    let err = context.update(ghost).unwrap_err();
    assert!(matches!(err, ContextError::ObjectNotFound(_)));
}

#[test]
fn fetch_all_overlays_staged_state_on_persisted_rows() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let saved = ManagedRecord::new("note");
    let saved_id = context.insert(saved).unwrap();
    context.save().unwrap();

    let staged = ManagedRecord::new("note");
    let staged_id = context.insert(staged).unwrap();
    context.delete_object("note", saved_id).unwrap();

    let visible = context.fetch_all("note").unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, staged_id);
}
