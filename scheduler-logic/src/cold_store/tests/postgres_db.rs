use std::collections::HashMap;

use chrono::{Duration, Utc};

use crate::{
    cold_store::{postgres::PostgresColdStore, ColdStore},
    model::ScheduledEvent,
};

use super::init_db;

fn sample(schedule_id: &str, scheduled_at: chrono::DateTime<Utc>) -> ScheduledEvent {
    let now = Utc::now();
    ScheduledEvent::new(
        schedule_id.to_string(),
        "orders".to_string(),
        "order".to_string(),
        "ship".to_string(),
        b"payload".to_vec(),
        Some("corr-1".to_string()),
        HashMap::new(),
        scheduled_at,
        0,
        None,
        now,
    )
}

#[tokio::test]
async fn insert_is_idempotent() {
    let db = init_db("cold_events_insert_idempotent").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let evt = sample("evt-1", Utc::now());
    store.insert(&evt).await.unwrap();
    store.insert(&evt).await.unwrap();

    let found = store.find("evt-1").await.unwrap().unwrap();
    assert_eq!(found.schedule_id, "evt-1");
}

#[tokio::test]
async fn scan_due_for_transfer_respects_horizon_and_order() {
    let db = init_db("cold_events_scan_due").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    store.insert(&sample("due-soon", now + Duration::seconds(10))).await.unwrap();
    store.insert(&sample("due-later", now + Duration::seconds(7200))).await.unwrap();

    let due = store
        .scan_due_for_transfer(now, 3_600, 10)
        .await
        .unwrap();

    assert_eq!(due.len(), 1);
    assert_eq!(due[0].schedule_id, "due-soon");
}

#[tokio::test]
async fn transfer_lifecycle_guards_transitions() {
    let db = init_db("cold_events_transfer_lifecycle").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    store.insert(&sample("evt-2", now)).await.unwrap();

    assert!(store.mark_transferring("evt-2", "node-a", now).await.unwrap());
    // a second mark_transferring from a different node must fail: status already changed
    assert!(!store.mark_transferring("evt-2", "node-b", now).await.unwrap());

    assert!(store.finalize_transferred("evt-2", now).await.unwrap());
    // finalize is not idempotent once already succeeded
    assert!(!store.finalize_transferred("evt-2", now).await.unwrap());

    let found = store.find("evt-2").await.unwrap().unwrap();
    assert_eq!(found.status.as_str(), "succeeded");
}

#[tokio::test]
async fn revert_transfer_returns_entry_to_pending() {
    let db = init_db("cold_events_revert_transfer").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    store.insert(&sample("evt-3", now)).await.unwrap();
    store.mark_transferring("evt-3", "node-a", now).await.unwrap();

    assert!(store.revert_transfer("evt-3", now).await.unwrap());
    let found = store.find("evt-3").await.unwrap().unwrap();
    assert_eq!(found.status.as_str(), "pending");
    assert!(found.node_id.is_none());
}

#[tokio::test]
async fn cancel_only_succeeds_while_pending() {
    let db = init_db("cold_events_cancel").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    store.insert(&sample("evt-4", now)).await.unwrap();
    assert!(store.cancel("evt-4", now).await.unwrap());
    // already cancelled: second cancel is a no-op, not an error
    assert!(!store.cancel("evt-4", now).await.unwrap());
}

#[tokio::test]
async fn cleanup_expired_removes_old_terminal_entries_only() {
    let db = init_db("cold_events_cleanup_expired").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    let old = now - Duration::days(31);

    store.insert(&sample("stale-cancelled", old)).await.unwrap();
    store.cancel("stale-cancelled", old).await.unwrap();

    store.insert(&sample("fresh-pending", now)).await.unwrap();

    let removed = store.cleanup_expired(now, 30).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.find("stale-cancelled").await.unwrap().is_none());
    assert!(store.find("fresh-pending").await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_expired_also_removes_old_failed_entries() {
    let db = init_db("cold_events_cleanup_expired_failed").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    let old = now - Duration::days(31);

    let mut stale_failed = sample("stale-failed", old);
    stale_failed.status = crate::model::EventStatus::Failed;
    store.insert(&stale_failed).await.unwrap();

    let removed = store.cleanup_expired(now, 30).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.find("stale-failed").await.unwrap().is_none());
}

#[tokio::test]
async fn count_pending_counts_only_pending_entries() {
    let db = init_db("cold_events_count_pending").await;
    let store = PostgresColdStore::new(db.client().as_ref().clone());

    let now = Utc::now();
    store.insert(&sample("pending-1", now)).await.unwrap();
    store.insert(&sample("pending-2", now)).await.unwrap();
    store.insert(&sample("to-cancel", now)).await.unwrap();
    store.cancel("to-cancel", now).await.unwrap();

    assert_eq!(store.count_pending().await.unwrap(), 2);
}
