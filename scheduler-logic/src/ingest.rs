use std::sync::Arc;

use chrono::Utc;

use crate::{
    clock::Clock,
    cold_store::ColdStore,
    error::Result,
    hot_store::HotStore,
    metrics,
    model::{ScheduleId, ScheduledEvent},
    router::{self, Tier},
    settings::SchedulerSettings,
};

/// Outcome of a [`Scheduler::cancel`] call. Callers must be able to
/// tell "the entry fired (or is firing) already" from "no such entry
/// ever existed" (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    TooLate,
}

/// The core's inbound surface: `schedule(evt) -> schedule_id` and
/// `cancel(schedule_id) -> outcome` (`spec.md` §6). This is the only
/// caller of [`router::route`] — routing is decided once, at ingest,
/// and the resulting placement is committed with a single store write.
///
/// The ingest transport itself (the pre-existing message-bus consumer)
/// is out of scope; this struct is the library API that transport (or
/// the thin HTTP surface) calls into.
pub struct Scheduler {
    hot_store: Arc<dyn HotStore>,
    cold_store: Arc<dyn ColdStore>,
    clock: Arc<dyn Clock>,
    immediate_horizon_seconds: i64,
}

impl Scheduler {
    pub fn new(
        hot_store: Arc<dyn HotStore>,
        cold_store: Arc<dyn ColdStore>,
        clock: Arc<dyn Clock>,
        settings: &SchedulerSettings,
    ) -> Self {
        Self {
            hot_store,
            cold_store,
            clock,
            immediate_horizon_seconds: settings.immediate_horizon_seconds,
        }
    }

    /// Routes `evt` to the hot or cold tier and commits it with a
    /// single idempotent store write. A duplicate `schedule_id` with
    /// byte-equal content is treated as success; a duplicate with
    /// different content surfaces `SchedulerError::Conflict`.
    #[tracing::instrument(name = "schedule", skip_all, fields(schedule_id = %evt.schedule_id))]
    pub async fn schedule(&self, evt: ScheduledEvent) -> Result<ScheduleId> {
        let now = self.clock.now();
        match router::route(evt.scheduled_at, now, self.immediate_horizon_seconds) {
            Tier::Hot => self.hot_store.add(&evt).await?,
            Tier::Cold => self.cold_store.insert(&evt).await?,
        }
        metrics::EVENTS_SCHEDULED_TOTAL.inc();
        Ok(evt.schedule_id)
    }

    /// Cancels `schedule_id` if it is still `pending` in whichever
    /// tier currently holds it. Checks the hot tier first since that
    /// is where an entry nearing its fire time lives.
    #[tracing::instrument(name = "cancel", skip_all, fields(schedule_id = %schedule_id))]
    pub async fn cancel(&self, schedule_id: &str) -> Result<CancelOutcome> {
        if self.hot_store.cancel(schedule_id).await? {
            return Ok(CancelOutcome::Cancelled);
        }

        let now = self.clock.now();
        if self.cold_store.cancel(schedule_id, now).await? {
            return Ok(CancelOutcome::Cancelled);
        }

        match self.cold_store.find(schedule_id).await? {
            Some(_) => Ok(CancelOutcome::TooLate),
            None => Ok(CancelOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        clock::FakeClock, cold_store::fake::FakeColdStore, hot_store::fake::FakeHotStore,
        model::EventStatus,
    };

    fn sample(schedule_id: &str, scheduled_at: chrono::DateTime<Utc>) -> ScheduledEvent {
        ScheduledEvent::new(
            schedule_id.into(),
            "orders".into(),
            "order".into(),
            "ship".into(),
            b"payload".to_vec(),
            None,
            HashMap::new(),
            scheduled_at,
            0,
            None,
            scheduled_at,
        )
    }

    fn harness() -> (Arc<FakeHotStore>, Arc<FakeColdStore>, Arc<FakeClock>, Scheduler) {
        let hot_store = Arc::new(FakeHotStore::new());
        let cold_store = Arc::new(FakeColdStore::new());
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let settings = SchedulerSettings::default();
        let scheduler = Scheduler::new(
            hot_store.clone(),
            cold_store.clone(),
            clock.clone(),
            &settings,
        );
        (hot_store, cold_store, clock, scheduler)
    }

    #[tokio::test]
    async fn routes_a_near_term_event_to_the_hot_store() {
        let (hot_store, cold_store, clock, scheduler) = harness();
        let now = clock.now();
        let id = scheduler
            .schedule(sample("evt-1", now + ChronoDuration::seconds(5)))
            .await
            .unwrap();

        assert_eq!(id, "evt-1");
        assert!(hot_store.contains("evt-1"));
        assert!(cold_store.find("evt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn routes_a_far_out_event_to_the_cold_store() {
        let (hot_store, cold_store, clock, scheduler) = harness();
        let now = clock.now();
        let settings = SchedulerSettings::default();
        let far_out = now + ChronoDuration::seconds(settings.immediate_horizon_seconds + 1);
        scheduler.schedule(sample("evt-2", far_out)).await.unwrap();

        assert!(!hot_store.contains("evt-2"));
        assert!(cold_store.find("evt-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn re_scheduling_the_same_id_with_identical_content_is_idempotent() {
        let (_hot_store, _cold_store, clock, scheduler) = harness();
        let now = clock.now();
        let evt = sample("evt-3", now + ChronoDuration::seconds(5));

        scheduler.schedule(evt.clone()).await.unwrap();
        let second = scheduler.schedule(evt).await;

        assert_eq!(second.unwrap(), "evt-3");
    }

    #[tokio::test]
    async fn re_scheduling_the_same_id_with_different_content_conflicts() {
        let (_hot_store, _cold_store, clock, scheduler) = harness();
        let now = clock.now();
        scheduler
            .schedule(sample("evt-4", now + ChronoDuration::seconds(5)))
            .await
            .unwrap();

        let mut conflicting = sample("evt-4", now + ChronoDuration::seconds(5));
        conflicting.body = b"different payload".to_vec();

        let err = scheduler.schedule(conflicting).await.unwrap_err();
        assert!(matches!(err, crate::error::SchedulerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn cancel_removes_a_pending_hot_entry() {
        let (_hot_store, _cold_store, clock, scheduler) = harness();
        let now = clock.now();
        scheduler
            .schedule(sample("evt-5", now + ChronoDuration::seconds(5)))
            .await
            .unwrap();

        assert_eq!(scheduler.cancel("evt-5").await.unwrap(), CancelOutcome::Cancelled);
    }

    #[tokio::test]
    async fn cancel_removes_a_pending_cold_entry() {
        let (_hot_store, cold_store, clock, scheduler) = harness();
        let now = clock.now();
        let settings = SchedulerSettings::default();
        let far_out = now + ChronoDuration::seconds(settings.immediate_horizon_seconds + 1);
        scheduler.schedule(sample("evt-6", far_out)).await.unwrap();

        assert_eq!(scheduler.cancel("evt-6").await.unwrap(), CancelOutcome::Cancelled);
        let cold = cold_store.find("evt-6").await.unwrap().unwrap();
        assert_eq!(cold.status, EventStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_of_an_unknown_id_reports_not_found() {
        let (_hot_store, _cold_store, _clock, scheduler) = harness();
        assert_eq!(scheduler.cancel("ghost").await.unwrap(), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn cancel_after_the_entry_already_succeeded_reports_too_late() {
        let (_hot_store, cold_store, clock, scheduler) = harness();
        let now = clock.now();
        let mut evt = sample("evt-7", now);
        evt.status = EventStatus::Succeeded;
        cold_store.insert(&evt).await.unwrap();

        assert_eq!(scheduler.cancel("evt-7").await.unwrap(), CancelOutcome::TooLate);
    }

    #[tokio::test]
    async fn cancel_twice_reports_not_found_the_second_time() {
        let (_hot_store, _cold_store, clock, scheduler) = harness();
        let now = clock.now();
        scheduler
            .schedule(sample("evt-8", now + ChronoDuration::seconds(5)))
            .await
            .unwrap();

        assert_eq!(scheduler.cancel("evt-8").await.unwrap(), CancelOutcome::Cancelled);
        assert_eq!(scheduler.cancel("evt-8").await.unwrap(), CancelOutcome::NotFound);
    }
}
