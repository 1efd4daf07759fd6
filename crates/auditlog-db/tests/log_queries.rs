//! Log queries, flushing and JSONL export.

use std::sync::Arc;

use auditlog_core::enums::LogAction;
use auditlog_core::instance::Instance;
use auditlog_core::changes::Changes;
use auditlog_core::log_entry::{LogEntry, NewLogEntry};
use auditlog_db::context::{AuditContext, with_context};
use auditlog_db::error::DatabaseError;
use auditlog_db::export::read_jsonl;
use auditlog_db::repos::log_entries::LogFilter;
use auditlog_db::service::AuditService;
use auditlog_fixtures::models::{SIMPLE_INCLUDE_MODEL, SIMPLE_MODEL};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

async fn test_service() -> AuditService {
    let schema = auditlog_fixtures::schema().unwrap();
    let registries = auditlog_fixtures::register(&schema).unwrap().into_vec();
    AuditService::new_local(":memory:", Arc::new(schema), registries)
        .await
        .unwrap()
}

/// Two SimpleModel creates, one update and one SimpleIncludeModel create,
/// the last made by `bob`.
async fn seeded_service() -> AuditService {
    let svc = test_service().await;
    let first = svc
        .save(Instance::new(SIMPLE_MODEL).with("text", "first"))
        .await
        .unwrap();
    svc.save(Instance::new(SIMPLE_MODEL).with("text", "second"))
        .await
        .unwrap();
    let mut first = first;
    first.set("integer", 3_i64);
    svc.save(first).await.unwrap();
    with_context(
        AuditContext::actor("bob"),
        svc.save(Instance::new(SIMPLE_INCLUDE_MODEL).with("label", "included")),
    )
    .await
    .unwrap();
    svc
}

fn actions(entries: &[LogEntry]) -> Vec<LogAction> {
    entries.iter().map(|e| e.action).collect()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_log_returns_newest_first() {
    let svc = seeded_service().await;
    let all = svc.query_log(&LogFilter::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(
        actions(&all),
        vec![
            LogAction::Create,
            LogAction::Update,
            LogAction::Create,
            LogAction::Create
        ]
    );
    assert!(all.windows(2).all(|w| w[0].id > w[1].id));
    assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn query_log_filters_combine() {
    let svc = seeded_service().await;

    let simple_creates = svc
        .query_log(&LogFilter {
            content_type: Some("auditlog_tests.simplemodel".into()),
            action: Some(LogAction::Create),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(simple_creates.len(), 2);

    let first_only = svc
        .query_log(&LogFilter {
            content_type: Some("auditlog_tests.simplemodel".into()),
            object_pk: Some("1".into()),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(actions(&first_only), vec![LogAction::Update, LogAction::Create]);

    let by_bob = svc
        .query_log(&LogFilter {
            actor: Some("bob".into()),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_bob.len(), 1);
    assert_eq!(by_bob[0].content_type, "auditlog_tests.simpleincludemodel");

    let limited = svc
        .query_log(&LogFilter {
            limit: Some(2),
            ..LogFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn get_entry_by_id() {
    let svc = seeded_service().await;
    let newest = svc.query_log(&LogFilter::default()).await.unwrap().remove(0);
    assert_eq!(svc.get_entry(newest.id).await.unwrap(), newest);
    assert!(matches!(svc.get_entry(999).await, Err(DatabaseError::NoResult)));
}

#[tokio::test]
async fn appended_entry_id_matches_stored_row() {
    let svc = seeded_service().await;
    let before = svc.query_log(&LogFilter::default()).await.unwrap();
    let appended = svc
        .append_entry(NewLogEntry {
            content_type: SIMPLE_MODEL.to_string(),
            object_pk: "99".to_string(),
            object_id: Some(99),
            object_repr: "manual".to_string(),
            action: LogAction::Access,
            changes: Changes::new(),
            actor: Some("carol".to_string()),
            remote_addr: None,
            cid: None,
            additional_data: None,
        })
        .await
        .unwrap();

    assert_eq!(appended.id, before[0].id + 1);
    assert_eq!(svc.get_entry(appended.id).await.unwrap(), appended);
}

#[tokio::test]
async fn changes_display_requires_known_content_type() {
    let svc = seeded_service().await;
    let mut entry = svc.query_log(&LogFilter::default()).await.unwrap().remove(0);
    assert!(svc.changes_display(&entry).is_ok());

    entry.content_type = "other_app.unknown".into();
    assert!(matches!(
        svc.changes_display(&entry),
        Err(DatabaseError::Core(_))
    ));
}

// ---------------------------------------------------------------------------
// Flush
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flush_before_keeps_newer_entries() {
    let svc = seeded_service().await;

    let removed = svc
        .flush(Some(Utc::now() - Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let removed = svc
        .flush(Some(Utc::now() + Duration::seconds(1)))
        .await
        .unwrap();
    assert_eq!(removed, 4);
    assert!(svc.query_log(&LogFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn flush_everything() {
    let svc = seeded_service().await;
    assert_eq!(svc.flush(None).await.unwrap(), 4);
    assert_eq!(svc.flush(None).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_writes_oldest_first() {
    let svc = seeded_service().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.jsonl");

    let written = svc
        .export_jsonl(&path, &LogFilter::default())
        .await
        .unwrap();
    assert_eq!(written, 4);

    let mut expected = svc.query_log(&LogFilter::default()).await.unwrap();
    expected.reverse();
    assert_eq!(read_jsonl(&path).unwrap(), expected);
}

#[tokio::test]
async fn export_respects_filter() {
    let svc = seeded_service().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("updates.jsonl");

    let written = svc
        .export_jsonl(
            &path,
            &LogFilter {
                action: Some(LogAction::Update),
                ..LogFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(written, 1);

    let exported = read_jsonl(&path).unwrap();
    assert_eq!(exported[0].action, LogAction::Update);
    assert!(exported[0].changes.contains_key("integer"));
}
