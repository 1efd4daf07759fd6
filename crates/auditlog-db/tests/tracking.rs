//! Change tracking through the fixture entities.
//!
//! - Create / update / delete entries for integer, string and UUID keys
//! - Include, exclude, mapping and mask options
//! - Additional data hooks
//! - Proxy and multi-table entities
//! - Datetime, choice, JSON and array changes and their display
//! - Actor context and access logging

use std::sync::Arc;

use auditlog_core::display::DisplayChange;
use auditlog_core::enums::LogAction;
use auditlog_core::errors::CoreError;
use auditlog_core::instance::Instance;
use auditlog_core::log_entry::LogEntry;
use auditlog_core::value::{FieldValue, PkValue};
use auditlog_db::context::{AuditContext, with_context};
use auditlog_db::error::DatabaseError;
use auditlog_db::service::AuditService;
use auditlog_fixtures::models::{
    ADDITIONAL_DATA_INCLUDED_MODEL, ALT_PRIMARY_KEY_MODEL, CHARFIELD_TEXTFIELD_MODEL,
    CHOICES_FIELD_MODEL, DATE_TIME_FIELD_MODEL, JSON_MODEL, POSTGRES_ARRAY_FIELD_MODEL,
    PROXY_MODEL, RELATED_MODEL, SIMPLE_EXCLUDE_MODEL, SIMPLE_INCLUDE_MODEL, SIMPLE_MAPPING_MODEL,
    SIMPLE_MASKED_MODEL, SIMPLE_MODEL, UUID_PRIMARY_KEY_MODEL,
};
use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

async fn test_service() -> AuditService {
    let schema = auditlog_fixtures::schema().unwrap();
    let registries = auditlog_fixtures::register(&schema).unwrap().into_vec();
    AuditService::new_local(":memory:", Arc::new(schema), registries)
        .await
        .unwrap()
}

async fn save(svc: &AuditService, instance: Instance) -> (Instance, PkValue) {
    let saved = svc.save(instance).await.unwrap();
    let entity = svc.schema().entity(saved.entity()).unwrap();
    let pk = entity.pk_of(&saved).unwrap();
    (saved, pk)
}

fn change(entry: &LogEntry, field: &str) -> (Option<String>, Option<String>) {
    let change = entry.changes[field]
        .as_field()
        .unwrap_or_else(|| panic!("{field} is not a field change"));
    (
        change.old().map(str::to_string),
        change.new_value().map(str::to_string),
    )
}

fn fields(entry: &LogEntry) -> Vec<&str> {
    entry.changes.keys().map(String::as_str).collect()
}

fn displayed(svc: &AuditService, entry: &LogEntry, label: &str) -> Vec<String> {
    match &svc.changes_display(entry).unwrap()[label] {
        DisplayChange::Values(values) => values.clone(),
        DisplayChange::ManyToMany(m2m) => panic!("unexpected m2m change {m2m:?}"),
    }
}

// ---------------------------------------------------------------------------
// Create / update / delete
// ---------------------------------------------------------------------------

#[rstest]
#[case::integer_key(Instance::new(SIMPLE_MODEL), true)]
#[case::string_key(Instance::new(ALT_PRIMARY_KEY_MODEL).with("key", "Original Key"), false)]
#[case::uuid_key(Instance::new(UUID_PRIMARY_KEY_MODEL), false)]
#[tokio::test]
async fn create_update_delete_for_every_key_type(
    #[case] instance: Instance,
    #[case] indexable: bool,
) {
    let svc = test_service().await;
    let entity_name = instance.entity().to_string();
    let (mut saved, pk) = save(&svc, instance.with("text", "I am not difficult.")).await;

    let history = svc.history(&entity_name, &pk).await.unwrap();
    assert_eq!(history.len(), 1);
    let created = &history[0];
    assert_eq!(created.action, LogAction::Create);
    assert_eq!(created.object_pk, pk.to_string());
    assert_eq!(created.object_id.is_some(), indexable);
    assert_eq!(
        change(created, "text"),
        (None, Some("I am not difficult.".into()))
    );
    assert_eq!(change(created, "boolean"), (None, Some("false".into())));
    assert!(!created.changes.contains_key("integer"));

    saved.set("boolean", true);
    svc.save(saved).await.unwrap();
    let history = svc.history(&entity_name, &pk).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, LogAction::Update);
    assert_eq!(
        change(&history[0], "boolean"),
        (Some("false".into()), Some("true".into()))
    );
    assert!(!history[0].changes.contains_key("text"));

    svc.delete(&entity_name, &pk).await.unwrap();
    let history = svc.history(&entity_name, &pk).await.unwrap();
    // delete_related removes the earlier entries
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, LogAction::Delete);
    assert_eq!(
        change(&history[0], "text"),
        (Some("I am not difficult.".into()), None)
    );
}

#[tokio::test]
async fn unchanged_save_logs_nothing() {
    let svc = test_service().await;
    let (saved, pk) = save(
        &svc,
        Instance::new(SIMPLE_INCLUDE_MODEL).with("label", "Houston"),
    )
    .await;
    svc.save(saved).await.unwrap();
    assert_eq!(svc.history(SIMPLE_INCLUDE_MODEL, &pk).await.unwrap().len(), 1);
}

#[tokio::test]
async fn string_key_is_required() {
    let svc = test_service().await;
    let err = svc.save(Instance::new(ALT_PRIMARY_KEY_MODEL)).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Core(_)), "got {err:?}");
}

#[tokio::test]
async fn object_repr_names_entity_and_key() {
    let svc = test_service().await;
    let (_, pk) = save(&svc, Instance::new(SIMPLE_MODEL)).await;
    let entry = &svc.history(SIMPLE_MODEL, &pk).await.unwrap()[0];
    assert_eq!(entry.object_repr, format!("SimpleModel object ({pk})"));
    assert_eq!(entry.content_type, "auditlog_tests.simplemodel");
}

// ---------------------------------------------------------------------------
// Field options
// ---------------------------------------------------------------------------

#[tokio::test]
async fn include_fields_track_only_named_fields() {
    let svc = test_service().await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(SIMPLE_INCLUDE_MODEL)
            .with("label", "Houston")
            .with("text", "Looking for a job"),
    )
    .await;
    let history = svc.history(SIMPLE_INCLUDE_MODEL, &pk).await.unwrap();
    assert_eq!(fields(&history[0]), vec!["label"]);

    // Changing an untracked field produces no entry
    saved.set("text", "Still looking");
    let saved = svc.save(saved).await.unwrap();
    assert_eq!(svc.history(SIMPLE_INCLUDE_MODEL, &pk).await.unwrap().len(), 1);

    let mut saved = saved;
    saved.set("label", "Austin");
    svc.save(saved).await.unwrap();
    let history = svc.history(SIMPLE_INCLUDE_MODEL, &pk).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        change(&history[0], "label"),
        (Some("Houston".into()), Some("Austin".into()))
    );
}

#[tokio::test]
async fn exclude_fields_track_everything_else() {
    let svc = test_service().await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(SIMPLE_EXCLUDE_MODEL)
            .with("label", "Exclude test")
            .with("text", "Looking for a job"),
    )
    .await;
    let history = svc.history(SIMPLE_EXCLUDE_MODEL, &pk).await.unwrap();
    assert_eq!(fields(&history[0]), vec!["id", "label"]);

    saved.set("text", "Not tracked");
    svc.save(saved).await.unwrap();
    assert_eq!(svc.history(SIMPLE_EXCLUDE_MODEL, &pk).await.unwrap().len(), 1);
}

#[tokio::test]
async fn mapping_changes_labels_not_values() {
    let svc = test_service().await;
    let (_, pk) = save(
        &svc,
        Instance::new(SIMPLE_MAPPING_MODEL)
            .with("sku", "ASD301301A6")
            .with("vtxt", "2.1.5")
            .with("not_mapped", "Not mapped"),
    )
    .await;
    let entry = &svc.history(SIMPLE_MAPPING_MODEL, &pk).await.unwrap()[0];

    // Stored changes keep field names
    assert_eq!(change(entry, "sku"), (None, Some("ASD301301A6".into())));

    assert_eq!(displayed(&svc, entry, "Product No."), vec!["None", "ASD301301A6"]);
    assert_eq!(displayed(&svc, entry, "Version"), vec!["None", "2.1.5"]);
    assert_eq!(displayed(&svc, entry, "not mapped"), vec!["None", "Not mapped"]);
}

#[tokio::test]
async fn masked_fields_are_redacted_not_omitted() {
    let svc = test_service().await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(SIMPLE_MASKED_MODEL)
            .with("address", "Sensitive value!")
            .with("text", "Plain text"),
    )
    .await;
    let entry = &svc.history(SIMPLE_MASKED_MODEL, &pk).await.unwrap()[0];
    assert_eq!(change(entry, "address"), (None, Some("********e value!".into())));
    assert_eq!(change(entry, "text"), (None, Some("Plain text".into())));

    saved.set("address", "Other value!");
    svc.save(saved).await.unwrap();
    let entry = &svc.history(SIMPLE_MASKED_MODEL, &pk).await.unwrap()[0];
    assert_eq!(
        change(entry, "address"),
        (
            Some("********e value!".into()),
            Some("******value!".into())
        )
    );
}

// ---------------------------------------------------------------------------
// Additional data
// ---------------------------------------------------------------------------

#[tokio::test]
async fn additional_data_is_attached_to_every_entry() {
    let svc = test_service().await;
    let (_, simple_pk) = save(
        &svc,
        Instance::new(SIMPLE_MODEL).with("text", "Related text"),
    )
    .await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(ADDITIONAL_DATA_INCLUDED_MODEL)
            .with("label", "Additional data")
            .with("related", simple_pk.clone()),
    )
    .await;
    saved.set("label", "Changed");
    svc.save(saved).await.unwrap();

    let history = svc.history(ADDITIONAL_DATA_INCLUDED_MODEL, &pk).await.unwrap();
    assert_eq!(history.len(), 2);
    let expected = json!({"related_model_id": 1, "related_model_text": "Related text"});
    for entry in &history {
        assert_eq!(
            serde_json::Value::Object(entry.additional_data.clone().unwrap()),
            expected
        );
    }

    // Entities without a hook carry none
    let simple = &svc.history(SIMPLE_MODEL, &simple_pk).await.unwrap()[0];
    assert_eq!(simple.additional_data, None);
}

// ---------------------------------------------------------------------------
// Inheritance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proxy_entries_use_concrete_content_type() {
    let svc = test_service().await;
    let (_, pk) = save(&svc, Instance::new(PROXY_MODEL).with("text", "proxied")).await;

    let proxied = svc.history(PROXY_MODEL, &pk).await.unwrap();
    assert_eq!(proxied.len(), 1);
    assert_eq!(proxied[0].content_type, "auditlog_tests.simplemodel");

    // Stored with, and visible as, the concrete entity
    let concrete = svc.get(SIMPLE_MODEL, &pk).await.unwrap();
    assert_eq!(concrete.text("text"), Some("proxied"));
    assert_eq!(svc.history(SIMPLE_MODEL, &pk).await.unwrap(), proxied);
}

#[tokio::test]
async fn multi_table_child_gets_pointer_key() {
    let svc = test_service().await;
    let (_, simple_pk) = save(&svc, Instance::new(SIMPLE_MODEL)).await;
    let (saved, pk) = save(
        &svc,
        Instance::new(RELATED_MODEL)
            .with("related", simple_pk.clone())
            .with("one_to_one", simple_pk.clone()),
    )
    .await;

    assert_eq!(pk, PkValue::Int(1));
    assert_eq!(saved.value("id"), &FieldValue::Int(1));

    let entry = &svc.history(RELATED_MODEL, &pk).await.unwrap()[0];
    assert_eq!(entry.content_type, "auditlog_tests.relatedmodel");
    assert_eq!(entry.object_id, Some(1));
    assert_eq!(change(entry, "relatedmodelparent_ptr"), (None, Some("1".into())));
    assert_eq!(change(entry, "related"), (None, Some(simple_pk.to_string())));
}

#[tokio::test]
async fn missing_foreign_key_target_is_rejected() {
    let svc = test_service().await;
    let err = svc
        .save(
            Instance::new(ADDITIONAL_DATA_INCLUDED_MODEL)
                .with("label", "orphan")
                .with("related", PkValue::Int(42)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn foreign_key_must_match_target_key_kind() {
    let svc = test_service().await;
    let (_, simple_pk) = save(&svc, Instance::new(SIMPLE_MODEL).with("text", "target")).await;
    assert_eq!(simple_pk, PkValue::Int(1));

    let err = svc
        .save(
            Instance::new(ADDITIONAL_DATA_INCLUDED_MODEL)
                .with("label", "text key")
                .with("related", PkValue::Str("1".into())),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, DatabaseError::Core(CoreError::TypeMismatch { ref field, .. }) if field == "related"),
        "got {err:?}"
    );
    assert!(svc.list(ADDITIONAL_DATA_INCLUDED_MODEL).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Datetimes
// ---------------------------------------------------------------------------

fn datetime_model() -> Instance {
    Instance::new(DATE_TIME_FIELD_MODEL)
        .with("label", "DateTimeField model")
        .with(
            "timestamp",
            FieldValue::datetime(&Utc.with_ymd_and_hms(2017, 1, 10, 12, 0, 0).unwrap()),
        )
        .with("date", NaiveDate::from_ymd_opt(2017, 1, 10).unwrap())
        .with("time", NaiveTime::from_hms_opt(12, 0, 0).unwrap())
}

#[tokio::test]
async fn same_instant_in_other_offset_is_not_a_change() {
    let svc = test_service().await;
    let (mut saved, pk) = save(&svc, datetime_model()).await;

    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    saved.set(
        "timestamp",
        FieldValue::datetime(&plus_two.with_ymd_and_hms(2017, 1, 10, 14, 0, 0).unwrap()),
    );
    let mut saved = svc.save(saved).await.unwrap();
    assert_eq!(svc.history(DATE_TIME_FIELD_MODEL, &pk).await.unwrap().len(), 1);

    saved.set(
        "timestamp",
        FieldValue::datetime(&Utc.with_ymd_and_hms(2017, 1, 10, 15, 0, 0).unwrap()),
    );
    svc.save(saved).await.unwrap();
    let history = svc.history(DATE_TIME_FIELD_MODEL, &pk).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        change(&history[0], "timestamp"),
        (
            Some("2017-01-10 12:00:00".into()),
            Some("2017-01-10 15:00:00".into())
        )
    );
}

#[tokio::test]
async fn naive_and_aware_datetimes_compare_by_utc_instant() {
    let svc = test_service().await;
    let (mut saved, pk) = save(&svc, datetime_model()).await;

    let naive = NaiveDate::from_ymd_opt(2017, 1, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    saved.set("timestamp", naive);
    let mut saved = svc.save(saved).await.unwrap();
    assert_eq!(svc.history(DATE_TIME_FIELD_MODEL, &pk).await.unwrap().len(), 1);

    saved.set("naive_dt", naive);
    svc.save(saved).await.unwrap();
    let history = svc.history(DATE_TIME_FIELD_MODEL, &pk).await.unwrap();
    assert_eq!(fields(&history[0]), vec!["naive_dt"]);
    assert_eq!(
        change(&history[0], "naive_dt"),
        (None, Some("2017-01-10 12:00:00".into()))
    );
}

#[tokio::test]
async fn datetimes_display_with_configured_formats() {
    let svc = test_service().await;
    let (_, pk) = save(&svc, datetime_model()).await;
    let entry = &svc.history(DATE_TIME_FIELD_MODEL, &pk).await.unwrap()[0];

    assert_eq!(displayed(&svc, entry, "timestamp"), vec!["None", "Jan 10, 2017 12:00"]);
    assert_eq!(displayed(&svc, entry, "date"), vec!["None", "Jan 10, 2017"]);
    assert_eq!(displayed(&svc, entry, "time"), vec!["None", "12:00"]);
}

// ---------------------------------------------------------------------------
// Display of choices, long text, JSON and arrays
// ---------------------------------------------------------------------------

#[tokio::test]
async fn choices_display_labels() {
    let svc = test_service().await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(CHOICES_FIELD_MODEL)
            .with("status", "r")
            .with("multiplechoice", r#"["r", "y"]"#),
    )
    .await;
    saved.set("status", "g");
    saved.set("multiplechoice", "x");
    svc.save(saved).await.unwrap();

    let history = svc.history(CHOICES_FIELD_MODEL, &pk).await.unwrap();
    let created = &history[1];
    assert_eq!(displayed(&svc, created, "status"), vec!["None", "Red"]);
    assert_eq!(
        displayed(&svc, created, "multiplechoice"),
        vec!["None", "Red, Yellow"]
    );

    let updated = &history[0];
    assert_eq!(displayed(&svc, updated, "status"), vec!["Red", "Green"]);
    assert_eq!(
        displayed(&svc, updated, "multiplechoice"),
        vec!["Red, Yellow", "None"]
    );
}

#[tokio::test]
async fn long_values_are_truncated_for_display() {
    let svc = test_service().await;
    let long_char = "a".repeat(255);
    let long_text = "b".repeat(1000);
    let (_, pk) = save(
        &svc,
        Instance::new(CHARFIELD_TEXTFIELD_MODEL)
            .with("longchar", long_char.clone())
            .with("longtextfield", long_text.clone()),
    )
    .await;
    let entry = &svc.history(CHARFIELD_TEXTFIELD_MODEL, &pk).await.unwrap()[0];

    // Stored in full
    assert_eq!(change(entry, "longchar").1, Some(long_char));
    assert_eq!(
        displayed(&svc, entry, "longchar")[1],
        format!("{}...", "a".repeat(140))
    );
    assert_eq!(
        displayed(&svc, entry, "longtextfield")[1],
        format!("{}...", "b".repeat(140))
    );
}

#[tokio::test]
async fn json_changes_are_recorded() {
    let svc = test_service().await;
    let (mut saved, pk) = save(&svc, Instance::new(JSON_MODEL)).await;
    let entry = &svc.history(JSON_MODEL, &pk).await.unwrap()[0];
    assert_eq!(change(entry, "json"), (None, Some("{}".into())));

    saved.set("json", json!({"quantity": "1", "name": "widget"}));
    let mut saved = svc.save(saved).await.unwrap();
    let entry = &svc.history(JSON_MODEL, &pk).await.unwrap()[0];
    assert_eq!(entry.action, LogAction::Update);
    assert_eq!(
        change(entry, "json"),
        (
            Some("{}".into()),
            Some(r#"{"name":"widget","quantity":"1"}"#.into())
        )
    );

    // Re-saving an equal document is not a change
    saved.set("json", json!({"name": "widget", "quantity": "1"}));
    svc.save(saved).await.unwrap();
    assert_eq!(svc.history(JSON_MODEL, &pk).await.unwrap().len(), 2);
}

#[tokio::test]
async fn array_changes_display_choice_labels() {
    let svc = test_service().await;
    let (mut saved, pk) = save(
        &svc,
        Instance::new(POSTGRES_ARRAY_FIELD_MODEL).with("arrayfield", FieldValue::text_array(["r", "g"])),
    )
    .await;
    saved.set("arrayfield", FieldValue::text_array(["g"]));
    svc.save(saved).await.unwrap();

    let history = svc.history(POSTGRES_ARRAY_FIELD_MODEL, &pk).await.unwrap();
    assert_eq!(change(&history[1], "arrayfield"), (None, Some(r#"["r","g"]"#.into())));
    assert_eq!(
        displayed(&svc, &history[0], "arrayfield"),
        vec!["Red, Green", "Green"]
    );
}

#[tokio::test]
async fn oversized_array_is_rejected() {
    let svc = test_service().await;
    let err = svc
        .save(
            Instance::new(POSTGRES_ARRAY_FIELD_MODEL)
                .with("arrayfield", FieldValue::text_array(["r", "y", "g", "r"])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Core(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Context and access
// ---------------------------------------------------------------------------

#[tokio::test]
async fn context_actor_is_stored_on_entries() {
    let svc = test_service().await;
    let (_, pk) = with_context(
        AuditContext::actor("alice")
            .remote_addr("203.0.113.7")
            .cid("req-42"),
        save(&svc, Instance::new(SIMPLE_MODEL)),
    )
    .await;

    let entry = &svc.history(SIMPLE_MODEL, &pk).await.unwrap()[0];
    assert_eq!(entry.actor.as_deref(), Some("alice"));
    assert_eq!(entry.remote_addr.as_deref(), Some("203.0.113.7"));
    assert_eq!(entry.cid.as_deref(), Some("req-42"));
}

#[tokio::test]
async fn disabled_context_logs_nothing() {
    let svc = test_service().await;
    let (_, pk) = with_context(AuditContext::disabled(), save(&svc, Instance::new(SIMPLE_MODEL))).await;

    assert!(svc.get(SIMPLE_MODEL, &pk).await.is_ok());
    assert!(svc.history(SIMPLE_MODEL, &pk).await.unwrap().is_empty());
}

#[tokio::test]
async fn access_is_logged_without_changes() {
    let svc = test_service().await;
    let (_, pk) = save(&svc, Instance::new(SIMPLE_MODEL)).await;

    let entries = svc.access(SIMPLE_MODEL, &pk).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, LogAction::Access);
    assert!(entries[0].changes.is_empty());

    let history = svc.history(SIMPLE_MODEL, &pk).await.unwrap();
    assert_eq!(history[0], entries[0]);
}
