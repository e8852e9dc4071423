mod postgres_db;

use blockscout_service_launcher::test_database::TestDbGuard;

pub async fn init_db(test_name: &str) -> TestDbGuard {
    TestDbGuard::new::<scheduler_migration::Migrator>(test_name).await
}
