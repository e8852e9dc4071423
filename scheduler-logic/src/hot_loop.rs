use std::{cmp, sync::Arc, sync::Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    analytics::AnalyticsRecorder,
    circuit_breaker::CircuitBreaker,
    clock::Clock,
    hot_store::{HotStore, ReleaseOutcome},
    metrics,
    model::{ExecutionRecord, ExecutionStatus, ScheduledEvent},
    publisher::{PublishOutcome, Publisher},
    settings::SchedulerSettings,
};

const MAX_BACKOFF_SECONDS: i64 = 3_600;

/// Polls the hot tier for due entries and fires them at the downstream
/// publisher, the near-term execution engine of `spec.md` §4.5.
///
/// Structured after `Indexer::start()`: a `sleep`-driven poll loop
/// whose output is dispatched with bounded concurrency via
/// `for_each_concurrent`, with per-entry retry handled inline rather
/// than blocking the tick (compare `process_job_with_retries`).
pub struct HotLoop {
    hot_store: Arc<dyn HotStore>,
    publisher: Arc<dyn Publisher>,
    analytics: Arc<dyn AnalyticsRecorder>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    node_id: String,
    store_breaker: CircuitBreaker,
    publish_breaker: CircuitBreaker,
    last_tick: Mutex<Option<DateTime<Utc>>>,
}

impl HotLoop {
    pub fn new(
        hot_store: Arc<dyn HotStore>,
        publisher: Arc<dyn Publisher>,
        analytics: Arc<dyn AnalyticsRecorder>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        node_id: String,
    ) -> Self {
        let cooldown = settings.circuit_breaker_cooldown.as_secs() as i64;
        Self {
            store_breaker: CircuitBreaker::new(
                "hot_store",
                settings.circuit_breaker_threshold,
                cooldown,
            ),
            publish_breaker: CircuitBreaker::new(
                "publisher",
                settings.circuit_breaker_threshold,
                cooldown,
            ),
            hot_store,
            publisher,
            analytics,
            clock,
            settings,
            node_id,
            last_tick: Mutex::new(None),
        }
    }

    /// When the last [`HotLoop::tick`] completed, for the `/health` and
    /// `/stats` endpoints.
    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.lock().unwrap()
    }

    pub fn hot_tick_interval(&self) -> std::time::Duration {
        self.settings.hot_tick_interval
    }

    #[instrument(name = "hot_loop", skip_all, level = "info")]
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.hot_tick_interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("hot loop shutting down");
                    return;
                }
            }
            self.tick().await;
        }
    }

    /// One reap-peek-claim-dispatch pass. Never returns an error:
    /// store failures are logged and retried on the next tick.
    pub async fn tick(&self) {
        let now = self.clock.now();
        *self.last_tick.lock().unwrap() = Some(now);

        if self.store_breaker.allow(now) {
            match self.hot_store.reap_stale(now, self.settings.stale_claim()).await {
                Ok(reaped) if !reaped.is_empty() => {
                    tracing::warn!(count = reaped.len(), "reaped stale processing entries");
                    self.store_breaker.record_success();
                }
                Ok(_) => self.store_breaker.record_success(),
                Err(err) => {
                    tracing::error!(error = %err, "failed to reap stale entries");
                    self.store_breaker.record_failure(now);
                }
            }
        } else {
            tracing::warn!("hot store circuit open, skipping dispatch this tick");
            return;
        }

        let due = match self
            .hot_store
            .peek_due(now, self.settings.max_concurrent_executions as u64 * 4)
            .await
        {
            Ok(due) => {
                self.store_breaker.record_success();
                due
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to peek due entries");
                self.store_breaker.record_failure(now);
                return;
            }
        };

        stream::iter(due)
            .for_each_concurrent(Some(self.settings.max_concurrent_executions as usize), |evt| {
                self.process(evt)
            })
            .await;
    }

    async fn process(&self, evt: ScheduledEvent) {
        let now = self.clock.now();

        let claimed = match self
            .hot_store
            .claim(&evt.schedule_id, &self.node_id, now)
            .await
        {
            Ok(Some(evt)) => evt,
            Ok(None) => return, // claimed by another node, or already gone
            Err(err) => {
                tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to claim entry");
                self.store_breaker.record_failure(now);
                return;
            }
        };

        if claimed.is_stale(now) {
            let delay_seconds = claimed.delay_seconds(now);
            tracing::warn!(
                schedule_id = %claimed.schedule_id,
                delay_seconds,
                max_delay_seconds = claimed.max_delay_seconds,
                "entry exceeded max_delay_seconds, skipping"
            );
            self.finish(&claimed, now, ReleaseOutcome::Failed, ExecutionStatus::Skipped, None, 0)
                .await;
            return;
        }

        if !self.publish_breaker.allow(now) {
            self.requeue(&claimed, now, "downstream publisher circuit open".to_string())
                .await;
            return;
        }

        let started = self.clock.now();
        let outcome = self
            .publisher
            .publish(
                &claimed.topic,
                &claimed.headers,
                &claimed.body,
                claimed.correlation_id.as_deref(),
            )
            .await;
        let processing_time_ms = (self.clock.now() - started).num_milliseconds().max(0);

        match outcome {
            PublishOutcome::Delivered => {
                self.publish_breaker.record_success();
                self.finish(
                    &claimed,
                    now,
                    ReleaseOutcome::Succeeded,
                    ExecutionStatus::Success,
                    None,
                    processing_time_ms,
                )
                .await;
            }
            PublishOutcome::Transient(err) => {
                self.publish_breaker.record_failure(now);
                self.requeue(&claimed, now, err).await;
            }
            PublishOutcome::Permanent(err) => {
                self.finish(
                    &claimed,
                    now,
                    ReleaseOutcome::Failed,
                    ExecutionStatus::Error,
                    Some(err),
                    processing_time_ms,
                )
                .await;
            }
        }
    }

    /// Releases a transiently-failed entry back to `pending` with
    /// exponential backoff, or gives up after `max_retries`
    /// (`spec.md` §4.5).
    async fn requeue(&self, evt: &ScheduledEvent, now: chrono::DateTime<chrono::Utc>, error: String) {
        let retry_count = evt.retry_count + 1;
        if retry_count > self.settings.max_retries() {
            tracing::error!(
                schedule_id = %evt.schedule_id,
                retry_count,
                error,
                "exceeded max_retries, giving up"
            );
            self.finish(
                evt,
                now,
                ReleaseOutcome::Failed,
                ExecutionStatus::Error,
                Some(error),
                0,
            )
            .await;
            return;
        }

        let backoff_seconds = cmp::min(
            self.settings.retry_delay_seconds as i64 * 2i64.pow(evt.retry_count as u32),
            MAX_BACKOFF_SECONDS,
        );

        if let Err(err) = self
            .hot_store
            .release(
                &evt.schedule_id,
                now,
                ReleaseOutcome::Requeue {
                    delay: ChronoDuration::seconds(backoff_seconds),
                    retry_count,
                    error: Some(error),
                },
            )
            .await
        {
            tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to requeue entry");
            self.store_breaker.record_failure(now);
        } else {
            self.store_breaker.record_success();
        }
    }

    async fn finish(
        &self,
        evt: &ScheduledEvent,
        now: chrono::DateTime<chrono::Utc>,
        outcome: ReleaseOutcome,
        status: ExecutionStatus,
        error: Option<String>,
        processing_time_ms: i64,
    ) {
        if let Err(err) = self.hot_store.release(&evt.schedule_id, now, outcome).await {
            tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to release entry");
            self.store_breaker.record_failure(now);
        } else {
            self.store_breaker.record_success();
        }

        metrics::EVENTS_FIRED_TOTAL.with_label_values(&[status.as_str()]).inc();
        metrics::EXECUTION_DELAY_SECONDS.observe(evt.delay_seconds(now) as f64);
        metrics::PROCESSING_TIME_MS.observe(processing_time_ms as f64);

        self.analytics.record(ExecutionRecord::new(
            evt,
            now,
            status,
            error,
            processing_time_ms,
            self.node_id.clone(),
        ));
    }
}
