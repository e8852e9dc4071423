pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::{error::Result, model::ScheduledEvent};

/// Outcome of an execution attempt, fed back into `HotStore::release`
/// (`spec.md` §4.2).
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    Succeeded,
    Failed,
    Requeue {
        delay: ChronoDuration,
        retry_count: i32,
        error: Option<String>,
    },
}

/// Time-sorted set keyed by fire-time, with atomic claim semantics
/// (`spec.md` §4.2). The reference backend is a Redis sorted set; see
/// [`redis::RedisHotStore`].
#[async_trait]
pub trait HotStore: Send + Sync {
    /// Idempotent on `schedule_id`. `Err(Conflict)` if a non-equivalent
    /// record already holds the id.
    async fn add(&self, evt: &ScheduledEvent) -> Result<()>;

    /// Up to `limit` entries with score <= `now`, ordered ascending.
    async fn peek_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<ScheduledEvent>>;

    /// Atomic conditional remove+rewrite. `None` if someone else
    /// claimed it first or it no longer exists.
    async fn claim(
        &self,
        schedule_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledEvent>>;

    async fn release(
        &self,
        schedule_id: &str,
        now: DateTime<Utc>,
        outcome: ReleaseOutcome,
    ) -> Result<()>;

    /// Removes the entry if present and still `pending`. Returns
    /// whether it was removed.
    async fn cancel(&self, schedule_id: &str) -> Result<bool>;

    async fn count_pending(&self) -> Result<u64>;

    async fn count_due(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Entries currently claimed and in flight.
    async fn count_processing(&self) -> Result<u64>;

    /// Reverts `processing` entries abandoned past `stale_after` back
    /// to `pending`. Returns the ids reverted.
    async fn reap_stale(
        &self,
        now: DateTime<Utc>,
        stale_after: ChronoDuration,
    ) -> Result<Vec<String>>;
}
