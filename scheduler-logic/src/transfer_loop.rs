use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    circuit_breaker::CircuitBreaker,
    clock::Clock,
    cold_store::ColdStore,
    hot_store::HotStore,
    lock_manager::LockManager,
    metrics,
    settings::SchedulerSettings,
};

const LEASE_NAME: &str = "transfer_loop";
const CLEANUP_LEASE_NAME: &str = "cleanup_lease";

/// Periodically promotes entries whose fire time has entered the
/// `TRANSFER_HORIZON_SECONDS` window from the cold tier into the hot
/// tier (`spec.md` §4.6). Single-flight across the fleet via
/// [`LockManager`], mirroring the lease-guarded background passes
/// elsewhere in this codebase.
pub struct TransferLoop {
    cold_store: Arc<dyn ColdStore>,
    hot_store: Arc<dyn HotStore>,
    lock_manager: Arc<dyn LockManager>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    node_id: String,
    breaker: CircuitBreaker,
    ticks: std::sync::atomic::AtomicU32,
    last_tick: Mutex<Option<DateTime<Utc>>>,
}

impl TransferLoop {
    pub fn new(
        cold_store: Arc<dyn ColdStore>,
        hot_store: Arc<dyn HotStore>,
        lock_manager: Arc<dyn LockManager>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        node_id: String,
    ) -> Self {
        let cooldown = settings.circuit_breaker_cooldown.as_secs() as i64;
        Self {
            breaker: CircuitBreaker::new("cold_store", settings.circuit_breaker_threshold, cooldown),
            cold_store,
            hot_store,
            lock_manager,
            clock,
            settings,
            node_id,
            ticks: std::sync::atomic::AtomicU32::new(0),
            last_tick: Mutex::new(None),
        }
    }

    /// When the last [`TransferLoop::tick`] completed, for the
    /// `/stats` endpoint.
    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.lock().unwrap()
    }

    /// Node id currently holding the transfer lease, if any.
    pub async fn lease_holder(&self) -> crate::error::Result<Option<String>> {
        self.lock_manager.current_holder(LEASE_NAME).await
    }

    #[instrument(name = "transfer_loop", skip_all, level = "info")]
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.transfer_tick_interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("transfer loop shutting down");
                    return;
                }
            }
            self.tick().await;
        }
    }

    pub async fn tick(&self) {
        let now = self.clock.now();
        *self.last_tick.lock().unwrap() = Some(now);
        if !self.breaker.allow(now) {
            tracing::warn!("cold store circuit open, skipping transfer tick");
            return;
        }

        let lease_ttl = self.settings.transfer_tick_interval * 2;
        let lease = match self.lock_manager.acquire(LEASE_NAME, &self.node_id, lease_ttl).await {
            Ok(Some(lease)) => lease,
            Ok(None) => return, // another node holds the lease this pass
            Err(err) => {
                tracing::error!(error = %err, "failed to acquire transfer lease");
                return;
            }
        };

        let due = match self
            .cold_store
            .scan_due_for_transfer(
                now,
                self.settings.transfer_horizon_seconds,
                self.settings.transfer_batch_limit,
            )
            .await
        {
            Ok(due) => {
                self.breaker.record_success();
                due
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to scan cold store for due entries");
                self.breaker.record_failure(now);
                let _ = self.lock_manager.release(&lease).await;
                return;
            }
        };

        metrics::TRANSFER_BATCH_SIZE.observe(due.len() as f64);

        for evt in due {
            match self
                .cold_store
                .mark_transferring(&evt.schedule_id, &self.node_id, now)
                .await
            {
                Ok(true) => {}
                Ok(false) => continue, // raced with a cancel or a concurrent transfer
                Err(err) => {
                    tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to mark transferring");
                    self.breaker.record_failure(now);
                    continue;
                }
            }

            let mut evt = evt;
            evt.status = crate::model::EventStatus::Transferring;
            evt.node_id = Some(self.node_id.clone());
            evt.updated_at = now;

            match self.hot_store.add(&evt).await {
                Ok(()) => {
                    if let Err(err) = self.cold_store.finalize_transferred(&evt.schedule_id, now).await {
                        tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to finalize transfer");
                    }
                }
                Err(err) => {
                    tracing::error!(schedule_id = %evt.schedule_id, error = %err, "failed to insert into hot store, reverting");
                    if let Err(revert_err) = self.cold_store.revert_transfer(&evt.schedule_id, now).await {
                        tracing::error!(schedule_id = %evt.schedule_id, error = %revert_err, "failed to revert transfer");
                    }
                }
            }
        }

        if let Err(err) = self.lock_manager.renew(&lease, lease_ttl).await {
            tracing::debug!(error = ?err, "transfer lease renew failed at end of pass");
        }
        if let Err(err) = self.lock_manager.release(&lease).await {
            tracing::warn!(error = %err, "failed to release transfer lease");
        }

        self.maybe_cleanup(now).await;
    }

    /// Runs `ColdStore::cleanup_expired` unconditionally, bypassing
    /// `CLEANUP_INTERVAL_TICKS`. Used by the operator-facing `/cleanup`
    /// endpoint.
    pub async fn cleanup(&self) {
        let now = self.clock.now();
        self.run_cleanup(now).await;
    }

    async fn maybe_cleanup(&self, now: chrono::DateTime<chrono::Utc>) {
        let tick = self.ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        if tick % self.settings.cleanup_interval_ticks != 0 {
            return;
        }
        self.run_cleanup(now).await;
    }

    /// Single-flight across the fleet via `cleanup-lease` (`spec.md`
    /// §4.4/§5): two nodes racing a cleanup pass at the same moment —
    /// or the `/cleanup` and tick-gated paths on the same node racing
    /// each other — must not both run `cleanup_expired` concurrently.
    async fn run_cleanup(&self, now: chrono::DateTime<chrono::Utc>) {
        let lease = match self
            .lock_manager
            .acquire(CLEANUP_LEASE_NAME, &self.node_id, self.settings.cleanup_lease_ttl)
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => return, // another node holds the cleanup lease this pass
            Err(err) => {
                tracing::error!(error = %err, "failed to acquire cleanup lease");
                return;
            }
        };

        match self
            .cold_store
            .cleanup_expired(now, self.settings.execution_history_ttl_days)
            .await
        {
            Ok(removed) if removed > 0 => {
                tracing::info!(removed, "cleaned up expired cold store entries");
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "failed to clean up expired cold store entries"),
        }

        if let Err(err) = self.lock_manager.release(&lease).await {
            tracing::warn!(error = %err, "failed to release cleanup lease");
        }
    }
}
