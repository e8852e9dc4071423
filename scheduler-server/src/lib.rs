mod http;
mod settings;

pub use settings::Settings;

use std::sync::Arc;

use actix_web::{middleware::Condition, web, App, HttpServer};
use blockscout_service_launcher::database;
use scheduler_logic::{
    hot_store::redis::RedisHotStore, lock_manager::redis::RedisLockManager,
    publisher::LoggingPublisher, supervisor::Supervisor,
};
use scheduler_migration::Migrator;

const SERVICE_NAME: &str = "scheduler";

pub async fn run(settings: Settings) -> Result<(), anyhow::Error> {
    blockscout_service_launcher::tracing::init_logs(
        SERVICE_NAME,
        &settings.tracing,
        &settings.jaeger,
    )?;

    let db_connection = database::initialize_postgres::<Migrator>(&settings.database).await?;

    let hot_store = Arc::new(
        RedisHotStore::new(settings.redis.url.clone(), settings.redis.key_prefix.clone()).await?,
    );
    let lock_manager = Arc::new(
        RedisLockManager::new(settings.redis.url.clone(), settings.redis.key_prefix.clone())
            .await?,
    );
    let cold_store = Arc::new(scheduler_logic::cold_store::postgres::PostgresColdStore::new(
        db_connection.clone(),
    ));
    let publisher = Arc::new(LoggingPublisher);

    let supervisor = Arc::new(Supervisor::new(
        hot_store.clone(),
        cold_store.clone(),
        lock_manager.clone(),
        publisher,
        db_connection,
        settings.scheduler.clone(),
        settings.node_id.clone(),
    ));
    supervisor.start();

    let router = http::Router {
        hot_store,
        cold_store,
        lock_manager,
        supervisor: supervisor.clone(),
    };

    let http_settings = settings.server.http.clone();
    let cors_settings = http_settings.cors.clone();
    let cors_enabled = cors_settings.enabled;
    let json_cfg = web::JsonConfig::default().limit(http_settings.max_body_size);

    let http_server = HttpServer::new(move || {
        let cors = cors_settings.clone().build();
        App::new()
            .wrap(Condition::new(cors_enabled, cors))
            .app_data(json_cfg.clone())
            .configure(|service_config| {
                blockscout_service_launcher::launcher::HttpRouter::register_routes(
                    &router,
                    service_config,
                )
            })
    })
    .bind(http_settings.addr)?
    .run();

    tracing::info!(addr = %http_settings.addr, "scheduler http server listening");

    tokio::select! {
        res = http_server => {
            if let Err(err) = res {
                tracing::error!(error = %err, "http server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    supervisor.shutdown().await;

    Ok(())
}
