/// Error kinds shared across the hot/cold stores, the lock manager and
/// the downstream publisher. Loops log and swallow these per entry;
/// only ingest-facing callers (`Router::schedule`, `cancel`) propagate
/// them to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("store unavailable or timed out: {0}")]
    TransientStore(String),

    #[error("schedule_id {schedule_id} already exists with different content")]
    Conflict { schedule_id: String },

    #[error("lease {name} lost before work completed")]
    LeaseLost { name: String },

    #[error("downstream publish failed transiently: {0}")]
    PublishTransient(String),

    #[error("downstream publish failed permanently: {0}")]
    PublishPermanent(String),

    #[error(
        "entry is stale: delay {delay_seconds}s exceeds max_delay_seconds {max_delay_seconds}s"
    )]
    StaleEntry {
        delay_seconds: i64,
        max_delay_seconds: i64,
    },

    #[error("schedule_id {0} not found")]
    NotFound(String),
}

impl From<redis::RedisError> for SchedulerError {
    fn from(err: redis::RedisError) -> Self {
        SchedulerError::TransientStore(err.to_string())
    }
}

impl From<sea_orm::DbErr> for SchedulerError {
    fn from(err: sea_orm::DbErr) -> Self {
        SchedulerError::TransientStore(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
