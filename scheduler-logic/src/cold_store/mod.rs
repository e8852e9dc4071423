pub mod postgres;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{error::Result, model::ScheduledEvent};

/// Durable, append-mostly table keyed by `(status, scheduled_at)`
/// (`spec.md` §4.3). The reference backend is Postgres via sea-orm;
/// see [`postgres::PostgresColdStore`]. A columnar OLAP store,
/// partitioned by day, would be an alternate implementation of the
/// same trait.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Idempotent on `schedule_id`.
    async fn insert(&self, evt: &ScheduledEvent) -> Result<()>;

    /// `status = pending` with `scheduled_at <= now + horizon`, ordered
    /// by `scheduled_at` then `priority desc`.
    async fn scan_due_for_transfer(
        &self,
        now: DateTime<Utc>,
        horizon_seconds: i64,
        limit: u64,
    ) -> Result<Vec<ScheduledEvent>>;

    /// Guarded transition `pending -> transferring`. Fails (returns
    /// `false`) if the status has already changed.
    async fn mark_transferring(
        &self,
        schedule_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Guarded transition `transferring -> succeeded`.
    async fn finalize_transferred(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Guarded transition `transferring -> pending`.
    async fn revert_transfer(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Guarded transition `pending -> cancelled`.
    async fn cancel(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Removes entries in a terminal status whose `updated_at` is
    /// older than `EXECUTION_HISTORY_TTL_DAYS`. Returns the count
    /// removed.
    async fn cleanup_expired(&self, now: DateTime<Utc>, ttl_days: i64) -> Result<u64>;

    /// Looks up a single entry regardless of status, for `cancel`'s
    /// `not_found` vs `too_late` distinction and for tests.
    async fn find(&self, schedule_id: &str) -> Result<Option<ScheduledEvent>>;

    /// Count of `pending` entries, regardless of how far out they are.
    async fn count_pending(&self) -> Result<u64>;
}

#[cfg(test)]
pub mod fake {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::model::EventStatus;

    #[derive(Default)]
    pub struct FakeColdStore {
        events: Mutex<HashMap<String, ScheduledEvent>>,
    }

    impl FakeColdStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ColdStore for FakeColdStore {
        async fn insert(&self, evt: &ScheduledEvent) -> Result<()> {
            let mut events = self.events.lock().unwrap();
            events.entry(evt.schedule_id.clone()).or_insert_with(|| evt.clone());
            Ok(())
        }

        async fn scan_due_for_transfer(
            &self,
            now: DateTime<Utc>,
            horizon_seconds: i64,
            limit: u64,
        ) -> Result<Vec<ScheduledEvent>> {
            let cutoff = now + chrono::Duration::seconds(horizon_seconds);
            let events = self.events.lock().unwrap();
            let mut due: Vec<_> = events
                .values()
                .filter(|e| e.status == EventStatus::Pending && e.scheduled_at <= cutoff)
                .cloned()
                .collect();
            due.sort_by(|a, b| {
                (a.scheduled_at, -(a.priority as i64))
                    .cmp(&(b.scheduled_at, -(b.priority as i64)))
            });
            due.truncate(limit as usize);
            Ok(due)
        }

        async fn mark_transferring(
            &self,
            schedule_id: &str,
            node_id: &str,
            now: DateTime<Utc>,
        ) -> Result<bool> {
            let mut events = self.events.lock().unwrap();
            match events.get_mut(schedule_id) {
                Some(evt) if evt.status == EventStatus::Pending => {
                    evt.status = EventStatus::Transferring;
                    evt.node_id = Some(node_id.to_string());
                    evt.updated_at = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn finalize_transferred(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
            let mut events = self.events.lock().unwrap();
            match events.get_mut(schedule_id) {
                Some(evt) if evt.status == EventStatus::Transferring => {
                    evt.status = EventStatus::Succeeded;
                    evt.updated_at = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn revert_transfer(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
            let mut events = self.events.lock().unwrap();
            match events.get_mut(schedule_id) {
                Some(evt) if evt.status == EventStatus::Transferring => {
                    evt.status = EventStatus::Pending;
                    evt.node_id = None;
                    evt.updated_at = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn cancel(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
            let mut events = self.events.lock().unwrap();
            match events.get_mut(schedule_id) {
                Some(evt) if evt.status == EventStatus::Pending => {
                    evt.status = EventStatus::Cancelled;
                    evt.updated_at = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn cleanup_expired(&self, now: DateTime<Utc>, ttl_days: i64) -> Result<u64> {
            let cutoff = now - chrono::Duration::days(ttl_days);
            let mut events = self.events.lock().unwrap();
            let before = events.len();
            events.retain(|_, evt| {
                !(evt.status.is_terminal() && evt.updated_at < cutoff)
            });
            Ok((before - events.len()) as u64)
        }

        async fn find(&self, schedule_id: &str) -> Result<Option<ScheduledEvent>> {
            Ok(self.events.lock().unwrap().get(schedule_id).cloned())
        }

        async fn count_pending(&self) -> Result<u64> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.status == EventStatus::Pending)
                .count() as u64)
        }
    }
}
