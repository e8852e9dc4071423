use blockscout_service_launcher::{
    database::{DatabaseConnectSettings, DatabaseSettings},
    launcher::{ConfigSettings, MetricsSettings, ServerSettings},
    tracing::{JaegerSettings, TracingSettings},
};
use scheduler_logic::settings::SchedulerSettings;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RedisSettings {
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_key_prefix() -> String {
    "scheduler".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub tracing: TracingSettings,
    #[serde(default)]
    pub jaeger: JaegerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Identifies this process in `node_id` fields and lock contention
    /// logs. Defaults to a random per-process id.
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

fn default_node_id() -> String {
    format!("scheduler-{}", uuid::Uuid::new_v4())
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "SCHEDULER";
}

impl Settings {
    pub fn default(database_url: String, redis_url: String) -> Self {
        Self {
            server: Default::default(),
            metrics: Default::default(),
            tracing: Default::default(),
            jaeger: Default::default(),
            database: DatabaseSettings {
                connect: DatabaseConnectSettings::Url(database_url),
                create_database: Default::default(),
                run_migrations: Default::default(),
            },
            redis: RedisSettings {
                url: redis_url,
                key_prefix: default_redis_key_prefix(),
            },
            scheduler: SchedulerSettings::default(),
            node_id: default_node_id(),
        }
    }
}
