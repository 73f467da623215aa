use chrono::{Duration, Utc};
use faceaccess_models::{EventKind, EventResult, NewAuditRecord};
use faceaccess_store::Store;

async fn open_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("faceaccessd.db");
    let store = Store::open(path.to_str().unwrap()).await.expect("open store");
    (store, dir)
}

#[tokio::test]
async fn upsert_then_embed_then_fetch_active() {
    let (store, _dir) = open_store().await;
    let now = Utc::now();

    store
        .upsert_employee("e1", Some("Alex"), now - Duration::days(1), now + Duration::days(30), true)
        .await
        .expect("upsert");

    let id = store
        .add_embedding("e1", &[1.0, 0.0, 0.0], Some("hash-1"))
        .await
        .expect("add embedding");
    assert!(id > 0);

    let active = store
        .get_active_employees_with_embeddings()
        .await
        .expect("active with embeddings");
    assert_eq!(active.len(), 1);
    let (employee, vectors) = &active[0];
    assert_eq!(employee.employee_id, "e1");
    assert_eq!(vectors.len(), 1);
    assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
}

#[tokio::test]
async fn add_embedding_for_unknown_employee_fails() {
    let (store, _dir) = open_store().await;
    let err = store
        .add_embedding("ghost", &[0.1, 0.2], None)
        .await
        .expect_err("unknown employee must be rejected");
    assert!(matches!(err, faceaccess_store::StoreError::EmployeeNotFound(id) if id == "ghost"));
}

#[tokio::test]
async fn deactivate_removes_employee_from_active_set_but_keeps_record() {
    let (store, _dir) = open_store().await;
    let now = Utc::now();
    store
        .upsert_employee("e2", None, now - Duration::days(1), now + Duration::days(1), true)
        .await
        .expect("upsert");
    store.add_embedding("e2", &[0.0, 1.0, 0.0], None).await.expect("embed");

    let deactivated = store.deactivate_employee("e2").await.expect("deactivate");
    assert!(deactivated);

    let active = store.get_active_employees_with_embeddings().await.expect("active");
    assert!(active.is_empty());

    let still_there = store.get_employee("e2").await.expect("get").expect("present");
    assert!(!still_there.is_active);
}

#[tokio::test]
async fn delete_employee_leaves_audit_history_untouched() {
    let (store, _dir) = open_store().await;
    let now = Utc::now();
    store
        .upsert_employee("e3", None, now - Duration::days(1), now + Duration::days(1), true)
        .await
        .expect("upsert");

    store
        .log_access_attempt(NewAuditRecord {
            event_type: EventKind::FaceRecognition,
            employee_id: Some("e3".to_string()),
            matched_employee_id: Some("e3".to_string()),
            similarity_score: Some(0.91),
            result: EventResult::Granted,
            reason: Some("granted".to_string()),
            metadata: None,
        })
        .await
        .expect("log attempt never fails the caller");

    let deleted = store.delete_employee("e3").await.expect("delete");
    assert!(deleted);
    assert!(store.get_employee("e3").await.expect("get").is_none());

    let logs = store
        .get_audit_logs(None, None, None, 10)
        .await
        .expect("audit logs survive employee deletion");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].employee_id.as_deref(), Some("e3"));
}

#[tokio::test]
async fn delete_employee_cascades_to_embeddings() {
    let (store, _dir) = open_store().await;
    let now = Utc::now();
    store
        .upsert_employee("e5", None, now - Duration::days(1), now + Duration::days(1), true)
        .await
        .expect("upsert");
    store.add_embedding("e5", &[1.0, 0.0, 0.0], None).await.expect("embed");
    store.add_embedding("e5", &[0.0, 1.0, 0.0], None).await.expect("embed");

    let before = store.get_system_status().await.expect("status");
    assert_eq!(before.total_embeddings, 2);

    let deleted = store.delete_employee("e5").await.expect("delete");
    assert!(deleted);

    let after = store.get_system_status().await.expect("status");
    assert_eq!(after.total_embeddings, 0, "ON DELETE CASCADE must remove orphaned embeddings");
}

#[tokio::test]
async fn system_status_reflects_recent_activity() {
    let (store, _dir) = open_store().await;
    let now = Utc::now();
    store
        .upsert_employee("e4", None, now - Duration::days(1), now + Duration::days(1), true)
        .await
        .expect("upsert");
    store.add_embedding("e4", &[0.0, 0.0, 1.0], None).await.expect("embed");
    store
        .log_access_attempt(NewAuditRecord {
            event_type: EventKind::ExitButton,
            employee_id: None,
            matched_employee_id: None,
            similarity_score: None,
            result: EventResult::Granted,
            reason: Some("Exit button pressed".to_string()),
            metadata: None,
        })
        .await
        .expect("log attempt");

    let status = store.get_system_status().await.expect("status");
    assert_eq!(status.active_employees, 1);
    assert_eq!(status.total_employees, 1);
    assert_eq!(status.total_embeddings, 1);
    assert_eq!(status.attempts_last_hour, 1);
}
