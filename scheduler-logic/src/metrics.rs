use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

lazy_static! {
    pub static ref EVENTS_SCHEDULED_TOTAL: IntCounter = register_int_counter!(
        "events_scheduled_total",
        "total number of events accepted by the router",
    )
    .unwrap();
    pub static ref EVENTS_FIRED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "events_fired_total",
        "total number of execution attempts by terminal status",
        &["status"],
    )
    .unwrap();
    pub static ref TRANSFER_BATCH_SIZE: Histogram = register_histogram!(
        "transfer_batch_size",
        "number of entries promoted from the cold tier per transfer tick",
    )
    .unwrap();
    pub static ref EXECUTION_DELAY_SECONDS: Histogram = register_histogram!(
        "execution_delay_seconds",
        "seconds between scheduled_at and executed_at",
    )
    .unwrap();
    pub static ref PROCESSING_TIME_MS: Histogram = register_histogram!(
        "processing_time_ms",
        "wall-clock time spent executing a single entry, in milliseconds",
    )
    .unwrap();
}
