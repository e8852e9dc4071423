use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    analytics::AnalyticsSink,
    clock::{Clock, SystemClock},
    cold_store::ColdStore,
    hot_loop::HotLoop,
    hot_store::HotStore,
    ingest::Scheduler,
    lock_manager::LockManager,
    publisher::Publisher,
    settings::SchedulerSettings,
    transfer_loop::TransferLoop,
};

/// Owns every collaborator handle and spawns `HotLoop`, `TransferLoop`
/// and the analytics writer as tracked tasks, draining them on
/// cancellation. Mirrors `blockscout_service_launcher::launcher`'s
/// `LocalGracefulShutdownHandler` pattern (tracked tasks + a shared
/// `CancellationToken`) rather than a single-`Indexer` server binary,
/// since this crate supervises three independent loops instead of one.
pub struct Supervisor {
    scheduler: Arc<Scheduler>,
    hot_loop: Arc<HotLoop>,
    transfer_loop: Arc<TransferLoop>,
    analytics_flush: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Supervisor {
    pub fn new(
        hot_store: Arc<dyn HotStore>,
        cold_store: Arc<dyn ColdStore>,
        lock_manager: Arc<dyn LockManager>,
        publisher: Arc<dyn Publisher>,
        db: DatabaseConnection,
        settings: SchedulerSettings,
        node_id: String,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (analytics, analytics_flush) = AnalyticsSink::spawn(
            db,
            settings.analytics_batch_size,
            settings.analytics_max_age,
            shutdown.clone(),
        );
        let analytics = Arc::new(analytics);

        let scheduler = Arc::new(Scheduler::new(
            hot_store.clone(),
            cold_store.clone(),
            clock.clone(),
            &settings,
        ));

        let hot_loop = Arc::new(HotLoop::new(
            hot_store.clone(),
            publisher,
            analytics,
            clock.clone(),
            settings.clone(),
            node_id.clone(),
        ));
        let transfer_loop = Arc::new(TransferLoop::new(
            cold_store,
            hot_store,
            lock_manager,
            clock,
            settings,
            node_id,
        ));

        Self {
            scheduler,
            hot_loop,
            transfer_loop,
            analytics_flush: tokio::sync::Mutex::new(Some(analytics_flush)),
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    /// Spawns the supervised tasks. Returns immediately; call
    /// [`Supervisor::shutdown`] to drain them.
    pub fn start(&self) {
        let hot_loop = self.hot_loop.clone();
        let hot_shutdown = self.shutdown.clone();
        self.tracker
            .spawn(async move { hot_loop.run(hot_shutdown).await });

        let transfer_loop = self.transfer_loop.clone();
        let transfer_shutdown = self.shutdown.clone();
        self.tracker
            .spawn(async move { transfer_loop.run(transfer_shutdown).await });

        self.tracker.close();
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn hot_loop(&self) -> &HotLoop {
        &self.hot_loop
    }

    pub fn transfer_loop(&self) -> &TransferLoop {
        &self.transfer_loop
    }

    /// Signals every supervised task to stop and waits for them (and
    /// the analytics writer's final flush) to finish. Safe to call
    /// through a shared `Arc<Supervisor>`; a second call is a no-op
    /// beyond re-awaiting the already-drained tracker.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.wait().await;
        if let Some(handle) = self.analytics_flush.lock().await.take() {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "analytics writer task panicked during shutdown");
            }
        }
    }
}
