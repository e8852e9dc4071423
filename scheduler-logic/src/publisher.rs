use std::collections::HashMap;

use async_trait::async_trait;

/// Outcome of a downstream publish attempt (`spec.md` §4.2, §5
/// `PublishTransientError`/`PublishPermanentError`). `Transient`
/// signals the caller should requeue with backoff; `Permanent` signals
/// the caller should treat the event as failed outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Transient(String),
    Permanent(String),
}

/// Abstraction over the downstream event bus the scheduler fires
/// events into. The transport is left unnamed; this hides an external
/// sink behind a narrow trait (compare `indexer::DA`).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        headers: &HashMap<String, String>,
        body: &[u8],
        correlation_id: Option<&str>,
    ) -> PublishOutcome;
}

/// Default `Publisher`: logs every event as delivered and never fails.
/// A real deployment swaps this for a client of whatever bus the
/// fleet actually runs (Kafka, SQS, an internal HTTP webhook); the
/// spec treats the bus as an external collaborator outside this
/// crate's scope, so this is the documented extension point rather
/// than a production transport.
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(
        &self,
        topic: &str,
        headers: &HashMap<String, String>,
        body: &[u8],
        correlation_id: Option<&str>,
    ) -> PublishOutcome {
        tracing::info!(
            topic,
            correlation_id = ?correlation_id,
            body_len = body.len(),
            header_count = headers.len(),
            "publishing event"
        );
        PublishOutcome::Delivered
    }
}
