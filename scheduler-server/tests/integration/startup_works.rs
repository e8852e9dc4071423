use crate::helpers;
use blockscout_service_launcher::{test_database::TestDbGuard, test_server};
use pretty_assertions::assert_eq;
use scheduler_migration::Migrator;

#[tokio::test]
async fn test_startup_works() {
    let db = TestDbGuard::new::<Migrator>("scheduler_server_startup").await;
    let base = helpers::init_server(db.db_url()).await;
    let response: serde_json::Value = test_server::send_get_request(&base, "/health").await;
    assert_eq!(response, serde_json::json!({"status": "ok"}));
}
