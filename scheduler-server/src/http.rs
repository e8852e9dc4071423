use std::{collections::HashMap, sync::Arc};

use actix_web::{web, HttpResponse, Responder};
use blockscout_service_launcher::launcher;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use prometheus::{Encoder, TextEncoder};
use scheduler_logic::{
    cold_store::ColdStore,
    hot_store::HotStore,
    ingest::CancelOutcome,
    lock_manager::LockManager,
    model::ScheduledEvent,
    supervisor::Supervisor,
};
use serde::{Deserialize, Serialize};

/// Monitoring surface named at the operational boundary in `spec.md`
/// §6 and made concrete in `SPEC_FULL.md` §6: health, queue depth, and
/// manual nudges for the two background loops. Wired the way
/// `da-indexer-server/src/server.rs` builds its `Router` around
/// `launcher::HttpRouter`, minus the gRPC half this crate has no use
/// for.
#[derive(Clone)]
pub struct Router {
    pub hot_store: Arc<dyn HotStore>,
    pub cold_store: Arc<dyn ColdStore>,
    pub lock_manager: Arc<dyn LockManager>,
    pub supervisor: Arc<Supervisor>,
}

impl launcher::HttpRouter for Router {
    fn register_routes(&self, service_config: &mut web::ServiceConfig) {
        service_config
            .app_data(web::Data::new(self.clone()))
            .route("/health", web::get().to(health))
            .route("/stats", web::get().to(stats))
            .route("/sync", web::post().to(sync))
            .route("/cleanup", web::post().to(cleanup))
            .route("/metrics", web::get().to(metrics))
            .route("/schedule", web::post().to(schedule))
            .route("/cancel/{schedule_id}", web::post().to(cancel));
    }
}

/// Reports healthy only when both stores and the lock manager answer a
/// read, and `HotLoop` has ticked within the last `3 * HOT_TICK_INTERVAL`
/// (`SPEC_FULL.md` §6). `lock_manager.current_holder` on a throwaway
/// name is the cheapest read the trait offers.
async fn health(router: web::Data<Router>) -> impl Responder {
    let now = Utc::now();

    if let Err(err) = router.hot_store.count_pending().await {
        return HttpResponse::ServiceUnavailable().body(format!("hot store unreachable: {err}"));
    }
    if let Err(err) = router.cold_store.count_pending().await {
        return HttpResponse::ServiceUnavailable().body(format!("cold store unreachable: {err}"));
    }
    if let Err(err) = router.lock_manager.current_holder("health_check").await {
        return HttpResponse::ServiceUnavailable().body(format!("lock manager unreachable: {err}"));
    }

    let hot_loop = router.supervisor.hot_loop();
    let max_staleness = ChronoDuration::from_std(hot_loop.hot_tick_interval() * 3)
        .unwrap_or_else(|_| ChronoDuration::days(365));
    let ticking = hot_loop
        .last_tick_at()
        .is_some_and(|last_tick| now.signed_duration_since(last_tick) <= max_staleness);

    if ticking {
        HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
    } else {
        HttpResponse::ServiceUnavailable().body("hot loop tick is stale or has not run yet")
    }
}

#[derive(Serialize)]
struct Stats {
    pending_hot: u64,
    pending_cold: u64,
    processing: u64,
    due_now: u64,
    last_tick_at: Option<DateTime<Utc>>,
    last_transfer_at: Option<DateTime<Utc>>,
    transfer_lease_holder: Option<String>,
}

async fn stats(router: web::Data<Router>) -> impl Responder {
    let now = Utc::now();
    let pending_hot = match router.hot_store.count_pending().await {
        Ok(v) => v,
        Err(err) => return HttpResponse::ServiceUnavailable().body(err.to_string()),
    };
    let pending_cold = match router.cold_store.count_pending().await {
        Ok(v) => v,
        Err(err) => return HttpResponse::ServiceUnavailable().body(err.to_string()),
    };
    let processing = match router.hot_store.count_processing().await {
        Ok(v) => v,
        Err(err) => return HttpResponse::ServiceUnavailable().body(err.to_string()),
    };
    let due_now = match router.hot_store.count_due(now).await {
        Ok(v) => v,
        Err(err) => return HttpResponse::ServiceUnavailable().body(err.to_string()),
    };
    let transfer_lease_holder = match router.supervisor.transfer_loop().lease_holder().await {
        Ok(v) => v,
        Err(err) => return HttpResponse::ServiceUnavailable().body(err.to_string()),
    };

    HttpResponse::Ok().json(Stats {
        pending_hot,
        pending_cold,
        processing,
        due_now,
        last_tick_at: router.supervisor.hot_loop().last_tick_at(),
        last_transfer_at: router.supervisor.transfer_loop().last_tick_at(),
        transfer_lease_holder,
    })
}

/// Forces an out-of-cadence `TransferLoop` tick, for operators chasing
/// a backlog.
async fn sync(router: web::Data<Router>) -> impl Responder {
    router.supervisor.transfer_loop().tick().await;
    HttpResponse::Accepted().finish()
}

/// Forces an out-of-cadence cold-store cleanup pass, bypassing
/// `CLEANUP_INTERVAL_TICKS`.
async fn cleanup(router: web::Data<Router>) -> impl Responder {
    router.supervisor.transfer_loop().cleanup().await;
    HttpResponse::Accepted().finish()
}

/// Inbound payload for `POST /schedule`. Mirrors the library-level
/// `ScheduledEvent` constructor; `schedule_id` is caller-supplied when
/// present, otherwise generated so re-posting the same logical event
/// without an id does not happen to deduplicate.
#[derive(Deserialize)]
struct ScheduleRequest {
    schedule_id: Option<String>,
    topic: String,
    entity_type: String,
    action: String,
    body: Vec<u8>,
    correlation_id: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    scheduled_at: DateTime<Utc>,
    #[serde(default)]
    priority: i32,
    max_delay_seconds: Option<i64>,
}

#[derive(Serialize)]
struct ScheduleResponse {
    schedule_id: String,
}

/// `spec.md` §6: `schedule(evt) -> schedule_id`, deduplicated on
/// `schedule_id` by the library-level `Scheduler`.
async fn schedule(router: web::Data<Router>, payload: web::Json<ScheduleRequest>) -> impl Responder {
    let payload = payload.into_inner();
    let now = Utc::now();
    let evt = ScheduledEvent::new(
        payload
            .schedule_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        payload.topic,
        payload.entity_type,
        payload.action,
        payload.body,
        payload.correlation_id,
        payload.headers,
        payload.scheduled_at,
        payload.priority,
        payload.max_delay_seconds,
        now,
    );

    match router.supervisor.scheduler().schedule(evt).await {
        Ok(schedule_id) => HttpResponse::Ok().json(ScheduleResponse { schedule_id }),
        Err(err @ scheduler_logic::error::SchedulerError::Conflict { .. }) => {
            HttpResponse::Conflict().body(err.to_string())
        }
        Err(err) => HttpResponse::ServiceUnavailable().body(err.to_string()),
    }
}

#[derive(Serialize)]
struct CancelResponse {
    outcome: &'static str,
}

/// `spec.md` §6: `cancel(schedule_id) -> {cancelled | not_found | too_late}`.
async fn cancel(router: web::Data<Router>, schedule_id: web::Path<String>) -> impl Responder {
    match router.supervisor.scheduler().cancel(&schedule_id).await {
        Ok(outcome) => {
            let outcome = match outcome {
                CancelOutcome::Cancelled => "cancelled",
                CancelOutcome::NotFound => "not_found",
                CancelOutcome::TooLate => "too_late",
            };
            HttpResponse::Ok().json(CancelResponse { outcome })
        }
        Err(err) => HttpResponse::ServiceUnavailable().body(err.to_string()),
    }
}

async fn metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
