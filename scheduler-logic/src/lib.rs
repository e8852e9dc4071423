#[macro_use]
extern crate lazy_static;

pub mod analytics;
pub mod circuit_breaker;
pub mod clock;
pub mod cold_store;
pub mod error;
pub mod hot_loop;
pub mod hot_store;
pub mod ingest;
pub mod lock_manager;
pub mod metrics;
pub mod model;
pub mod publisher;
pub mod router;
pub mod settings;
pub mod supervisor;
pub mod transfer_loop;
