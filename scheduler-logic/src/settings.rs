use std::time;

use serde::Deserialize;
use serde_with::serde_as;

/// Configuration for the two-tier scheduling engine (`spec.md` §3.3).
/// Deserialized from the `SCHEDULER__*` environment prefix / config
/// file by the server crate via `ConfigSettings::build()`.
#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSettings {
    #[serde(default = "default_immediate_horizon_seconds")]
    pub immediate_horizon_seconds: i64,

    #[serde(default = "default_transfer_horizon_seconds")]
    pub transfer_horizon_seconds: i64,

    #[serde(default = "default_transfer_tick_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub transfer_tick_interval: time::Duration,

    #[serde(default = "default_hot_tick_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub hot_tick_interval: time::Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: u32,

    /// Defaults to `2 * hot_tick_interval` when unset, per `spec.md` §3.3.
    #[serde(default)]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub stale_claim_seconds: Option<time::Duration>,

    #[serde(default = "default_transfer_batch_limit")]
    pub transfer_batch_limit: u64,

    #[serde(default = "default_execution_history_ttl_days")]
    pub execution_history_ttl_days: i64,

    #[serde(default = "default_analytics_batch_size")]
    pub analytics_batch_size: usize,

    #[serde(default = "default_analytics_max_age")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub analytics_max_age: time::Duration,

    #[serde(default = "default_cleanup_interval_ticks")]
    pub cleanup_interval_ticks: u32,

    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    #[serde(default = "default_circuit_breaker_cooldown")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub circuit_breaker_cooldown: time::Duration,

    /// `spec.md` §4.4: TTL of the `cleanup-lease`, held for the
    /// duration of a `ColdStore::cleanup_expired` pass. "approximately
    /// one minute".
    #[serde(default = "default_cleanup_lease_ttl")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub cleanup_lease_ttl: time::Duration,
}

/// Scoring constant used by the hot store: `score = scheduled_at_unix_micros
/// - priority * PRIORITY_WEIGHT`. One second of micros, so priority only
/// breaks ties within the same second (`spec.md` §4.2).
pub const PRIORITY_WEIGHT: i64 = 1_000_000;

fn default_immediate_horizon_seconds() -> i64 {
    86_400
}

fn default_transfer_horizon_seconds() -> i64 {
    3_600
}

fn default_transfer_tick_interval() -> time::Duration {
    time::Duration::from_secs(300)
}

fn default_hot_tick_interval() -> time::Duration {
    time::Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    60
}

fn default_max_concurrent_executions() -> u32 {
    10
}

fn default_transfer_batch_limit() -> u64 {
    500
}

fn default_execution_history_ttl_days() -> i64 {
    30
}

fn default_analytics_batch_size() -> usize {
    100
}

fn default_analytics_max_age() -> time::Duration {
    time::Duration::from_secs(5)
}

fn default_cleanup_interval_ticks() -> u32 {
    12
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_cooldown() -> time::Duration {
    time::Duration::from_secs(30)
}

fn default_cleanup_lease_ttl() -> time::Duration {
    time::Duration::from_secs(60)
}

impl SchedulerSettings {
    /// `spec.md` §3.3: `STALE_CLAIM_SECONDS` defaults to
    /// `2 * REDIS_PROCESSING_INTERVAL` when not explicitly configured.
    pub fn stale_claim(&self) -> time::Duration {
        self.stale_claim_seconds
            .unwrap_or(self.hot_tick_interval * 2)
    }

    pub fn max_retries(&self) -> i32 {
        self.max_retries as i32
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            immediate_horizon_seconds: default_immediate_horizon_seconds(),
            transfer_horizon_seconds: default_transfer_horizon_seconds(),
            transfer_tick_interval: default_transfer_tick_interval(),
            hot_tick_interval: default_hot_tick_interval(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            max_concurrent_executions: default_max_concurrent_executions(),
            stale_claim_seconds: None,
            transfer_batch_limit: default_transfer_batch_limit(),
            execution_history_ttl_days: default_execution_history_ttl_days(),
            analytics_batch_size: default_analytics_batch_size(),
            analytics_max_age: default_analytics_max_age(),
            cleanup_interval_ticks: default_cleanup_interval_ticks(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown: default_circuit_breaker_cooldown(),
            cleanup_lease_ttl: default_cleanup_lease_ttl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_claim_defaults_to_twice_the_hot_tick() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.stale_claim(), settings.hot_tick_interval * 2);
    }

    #[test]
    fn stale_claim_honors_explicit_override() {
        let mut settings = SchedulerSettings::default();
        settings.stale_claim_seconds = Some(time::Duration::from_secs(42));
        assert_eq!(settings.stale_claim(), time::Duration::from_secs(42));
    }
}
