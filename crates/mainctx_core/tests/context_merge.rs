use mainctx_core::{AttributeValue, MainContext, ManagedRecord, StoreConfig};
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "version": 1,
    "entities": [{"name": "note", "attributes": {"title": "text"}}]
}"#;

fn title(value: &str) -> AttributeValue {
    AttributeValue::Text(value.to_string())
}

/// Opens two contexts over one store file: the "main" consumer and a
/// producer standing in for a background write context.
fn main_and_producer(dir: &TempDir) -> (MainContext, MainContext) {
    let path = dir.path().join("shared.sqlite3");
    let main = MainContext::open(StoreConfig::on_disk(&path, SCHEMA)).unwrap();
    let producer = MainContext::open(StoreConfig::on_disk(&path, SCHEMA)).unwrap();
    (main, producer)
}

#[test]
fn merged_update_is_visible_without_an_explicit_save() {
    let dir = TempDir::new().unwrap();
    let (main, producer) = main_and_producer(&dir);

    let mut note = ManagedRecord::new("note");
    note.set("title", title("original"));
    let id = producer.insert(note).unwrap();
    producer.save().unwrap();

    // Main registers the original copy.
    let seen = main.fetch("note", id).unwrap().unwrap();
    assert_eq!(seen.get("title"), Some(&title("original")));

    let mut edited = producer.fetch("note", id).unwrap().unwrap();
    edited.set("title", title("edited"));
    producer.update(edited).unwrap();
    let notification = producer.save().unwrap();

    // Registered copy still shadows the store until the merge lands.
    let stale = main.fetch("note", id).unwrap().unwrap();
    assert_eq!(stale.get("title"), Some(&title("original")));

    main.merge_changes(&notification).unwrap();

    let fresh = main.fetch("note", id).unwrap().unwrap();
    assert_eq!(fresh.get("title"), Some(&title("edited")));
    assert!(!main.has_pending_changes());
}

#[test]
fn merged_insert_appears_in_fetch_all() {
    let dir = TempDir::new().unwrap();
    let (main, producer) = main_and_producer(&dir);

    let mut note = ManagedRecord::new("note");
    note.set("title", title("from background"));
    producer.insert(note).unwrap();
    let notification = producer.save().unwrap();

    main.merge_changes(&notification).unwrap();

    let visible = main.fetch_all("note").unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].get("title"), Some(&title("from background")));
}

#[test]
fn merged_deletion_hides_the_object() {
    let dir = TempDir::new().unwrap();
    let (main, producer) = main_and_producer(&dir);

    let note = ManagedRecord::new("note");
    let id = producer.insert(note).unwrap();
    producer.save().unwrap();

    // Register the record in the main context first.
    assert!(main.fetch("note", id).unwrap().is_some());

    producer.delete_object("note", id).unwrap();
    let notification = producer.save().unwrap();
    main.merge_changes(&notification).unwrap();

    assert!(main.fetch("note", id).unwrap().is_none());
}

#[test]
fn merge_does_not_clobber_locally_staged_edits() {
    let dir = TempDir::new().unwrap();
    let (main, producer) = main_and_producer(&dir);

    let mut note = ManagedRecord::new("note");
    note.set("title", title("original"));
    let id = producer.insert(note).unwrap();
    producer.save().unwrap();

    let mut local = main.fetch("note", id).unwrap().unwrap();
    local.set("title", title("local edit"));
    main.update(local).unwrap();

    let mut remote = producer.fetch("note", id).unwrap().unwrap();
    remote.set("title", title("remote edit"));
    producer.update(remote).unwrap();
    let notification = producer.save().unwrap();

    main.merge_changes(&notification).unwrap();

    // Local uncommitted edit wins until it is saved.
    let seen = main.fetch("note", id).unwrap().unwrap();
    assert_eq!(seen.get("title"), Some(&title("local edit")));
    assert!(main.has_pending_changes());
}

#[test]
fn invalid_notification_is_rejected_without_a_partial_merge() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let mut valid = ManagedRecord::new("note");
    valid.set("title", title("valid"));
    let mut invalid = ManagedRecord::new("note");
    invalid.set("color", title("red"));

    let notification = mainctx_core::ChangeNotification {
        inserted: vec![valid.clone(), invalid],
        updated: vec![],
        deleted: vec![],
    };

    let err = context.merge_changes(&notification).unwrap_err();
    assert!(matches!(err, mainctx_core::ContextError::Validation(_)));

    // The valid record preceding the bad one must not have landed.
    assert!(context.fetch("note", valid.id).unwrap().is_none());
    assert!(context.fetch_all("note").unwrap().is_empty());
}

#[test]
fn merging_an_empty_notification_changes_nothing() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();
    let note = ManagedRecord::new("note");
    let id = context.insert(note).unwrap();
    context.save().unwrap();

    context
        .merge_changes(&mainctx_core::ChangeNotification::default())
        .unwrap();

    assert!(context.fetch("note", id).unwrap().is_some());
    assert_eq!(context.persisted_count("note").unwrap(), 1);
}
