use crate::helpers;
use blockscout_service_launcher::{test_database::TestDbGuard, test_server};
use chrono::Utc;
use pretty_assertions::assert_eq;
use scheduler_migration::Migrator;
use serde_json::{json, Value};

#[tokio::test]
async fn schedule_then_cancel_a_pending_event() {
    let db = TestDbGuard::new::<Migrator>("scheduler_server_schedule_cancel").await;
    let base = helpers::init_server(db.db_url()).await;

    let scheduled_at = Utc::now() + chrono::Duration::seconds(30);
    let response: Value = test_server::send_post_request(
        &base,
        "/schedule",
        &json!({
            "schedule_id": "evt-http-1",
            "topic": "orders",
            "entity_type": "order",
            "action": "ship",
            "body": [1, 2, 3],
            "scheduled_at": scheduled_at,
        }),
    )
    .await;
    assert_eq!(response, json!({"schedule_id": "evt-http-1"}));

    let cancel_response: Value =
        test_server::send_post_request(&base, "/cancel/evt-http-1", &json!({})).await;
    assert_eq!(cancel_response, json!({"outcome": "cancelled"}));

    let second_cancel: Value =
        test_server::send_post_request(&base, "/cancel/evt-http-1", &json!({})).await;
    assert_eq!(second_cancel, json!({"outcome": "not_found"}));
}

#[tokio::test]
async fn scheduling_the_same_id_twice_with_identical_content_is_idempotent() {
    let db = TestDbGuard::new::<Migrator>("scheduler_server_schedule_idempotent").await;
    let base = helpers::init_server(db.db_url()).await;

    let scheduled_at = Utc::now() + chrono::Duration::seconds(30);
    let request = json!({
        "schedule_id": "evt-http-2",
        "topic": "orders",
        "entity_type": "order",
        "action": "ship",
        "body": [1, 2, 3],
        "scheduled_at": scheduled_at,
    });

    let first: Value = test_server::send_post_request(&base, "/schedule", &request).await;
    let second: Value = test_server::send_post_request(&base, "/schedule", &request).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn scheduling_a_conflicting_id_returns_409() {
    let db = TestDbGuard::new::<Migrator>("scheduler_server_schedule_conflict").await;
    let base = helpers::init_server(db.db_url()).await;

    let scheduled_at = Utc::now() + chrono::Duration::seconds(30);
    let request = json!({
        "schedule_id": "evt-http-3",
        "topic": "orders",
        "entity_type": "order",
        "action": "ship",
        "body": [1, 2, 3],
        "scheduled_at": scheduled_at,
    });
    let _: Value = test_server::send_post_request(&base, "/schedule", &request).await;

    let conflicting = json!({
        "schedule_id": "evt-http-3",
        "topic": "orders",
        "entity_type": "order",
        "action": "refund",
        "body": [9, 9, 9],
        "scheduled_at": scheduled_at,
    });
    let response = reqwest::Client::new()
        .post(base.join("/schedule").unwrap())
        .json(&conflicting)
        .send()
        .await
        .expect("failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
}
