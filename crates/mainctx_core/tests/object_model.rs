use mainctx_core::{
    AttributeKind, AttributeValue, ContextError, MainContext, ManagedRecord, ModelError,
    ObjectModel, RecordValidationError, StoreConfig,
};

const SCHEMA: &str = r#"{
    "version": 3,
    "entities": [
        {"name": "note", "attributes": {"title": "text", "stars": "integer"}},
        {"name": "tag", "attributes": {"label": "text"}}
    ]
}"#;

#[test]
fn model_loads_entities_and_version_from_resource() {
    let model = ObjectModel::from_json_str(SCHEMA).unwrap();

    assert_eq!(model.version(), 3);
    assert_eq!(model.entities().count(), 2);

    let note = model.entity("note").unwrap();
    assert_eq!(note.attributes.get("title"), Some(&AttributeKind::Text));
    assert_eq!(note.attributes.get("stars"), Some(&AttributeKind::Integer));
    assert!(model.entity("missing").is_none());
}

#[test]
fn model_rejects_malformed_resources() {
    assert!(matches!(
        ObjectModel::from_json_str("not json").unwrap_err(),
        ModelError::Parse(_)
    ));
    assert!(matches!(
        ObjectModel::from_json_str(r#"{"version": 0, "entities": [{"name": "a", "attributes": {}}]}"#)
            .unwrap_err(),
        ModelError::ZeroVersion
    ));
    assert!(matches!(
        ObjectModel::from_json_str(r#"{"version": 1, "entities": []}"#).unwrap_err(),
        ModelError::NoEntities
    ));
    assert!(matches!(
        ObjectModel::from_json_str(r#"{"version": 1, "entities": [{"name": "Bad Name", "attributes": {}}]}"#)
            .unwrap_err(),
        ModelError::InvalidEntityName(_)
    ));
}

#[test]
fn record_validation_rejects_unknown_entity_and_attribute() {
    let model = ObjectModel::from_json_str(SCHEMA).unwrap();

    let ghost = ManagedRecord::new("ghost");
    assert!(matches!(
        model.validate_record(&ghost).unwrap_err(),
        RecordValidationError::UnknownEntity(name) if name == "ghost"
    ));

    let mut note = ManagedRecord::new("note");
    note.set("color", AttributeValue::Text("red".to_string()));
    assert!(matches!(
        model.validate_record(&note).unwrap_err(),
        RecordValidationError::UnknownAttribute { .. }
    ));
}

#[test]
fn record_validation_rejects_kind_mismatch() {
    let model = ObjectModel::from_json_str(SCHEMA).unwrap();

    let mut note = ManagedRecord::new("note");
    note.set("stars", AttributeValue::Text("five".to_string()));

    let err = model.validate_record(&note).unwrap_err();
    assert!(matches!(
        err,
        RecordValidationError::KindMismatch {
            expected: AttributeKind::Integer,
            actual: AttributeKind::Text,
            ..
        }
    ));
}

#[test]
fn context_refuses_records_that_do_not_fit_the_model() {
    let context = MainContext::open(StoreConfig::in_memory(SCHEMA)).unwrap();

    let mut note = ManagedRecord::new("note");
    note.set("stars", AttributeValue::Boolean(true));

    let err = context.insert(note).unwrap_err();
    assert!(matches!(err, ContextError::Validation(_)));
    assert!(!context.has_pending_changes());
}

#[test]
fn context_open_fails_on_invalid_schema_resource() {
    let err = MainContext::open(StoreConfig::in_memory("{\"version\": 1}")).unwrap_err();
    assert!(matches!(err, ContextError::Model(ModelError::Parse(_))));
}
