use std::time::Duration;

use sea_orm::{sea_query::OnConflict, ActiveValue::Set, DatabaseConnection, EntityTrait};
use scheduler_entity::execution_record::{ActiveModel, Column, Entity};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::ExecutionRecord;

/// Narrow interface `HotLoop` writes through, so tests can swap in
/// [`fake::FakeAnalyticsSink`] without a database.
pub trait AnalyticsRecorder: Send + Sync {
    fn record(&self, record: ExecutionRecord);
}

/// Append-only sink for execution outcomes (`spec.md` §4.7). `record`
/// never blocks the caller and never fails visibly to it: entries are
/// handed to an unbounded channel and written by a background task in
/// batches before a single `insert_many`, the way
/// `celestia::repository::blobs::upsert_many` buffers blob inserts.
#[derive(Clone)]
pub struct AnalyticsSink {
    sender: mpsc::UnboundedSender<ExecutionRecord>,
}

impl AnalyticsSink {
    /// Spawns the background flush task and returns a handle plus the
    /// `JoinHandle` so the caller can await it during shutdown.
    pub fn spawn(
        db: DatabaseConnection,
        batch_size: usize,
        max_age: Duration,
        shutdown: CancellationToken,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(db, receiver, batch_size, max_age, shutdown));
        (Self { sender }, handle)
    }

    /// Records one execution outcome. Errors (channel closed because
    /// the writer task died) are logged and swallowed — analytics is
    /// never allowed to affect the execution path (`spec.md` §7).
    pub fn record(&self, record: ExecutionRecord) {
        if self.sender.send(record).is_err() {
            tracing::error!("analytics writer is gone, dropping execution record");
        }
    }
}

impl AnalyticsRecorder for AnalyticsSink {
    fn record(&self, record: ExecutionRecord) {
        AnalyticsSink::record(self, record)
    }
}

async fn run_writer(
    db: DatabaseConnection,
    mut receiver: mpsc::UnboundedReceiver<ExecutionRecord>,
    batch_size: usize,
    max_age: Duration,
    shutdown: CancellationToken,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let mut deadline = tokio::time::Instant::now() + max_age;

    loop {
        tokio::select! {
            maybe_record = receiver.recv() => {
                match maybe_record {
                    Some(record) => {
                        if buffer.is_empty() {
                            deadline = tokio::time::Instant::now() + max_age;
                        }
                        buffer.push(record);
                        if buffer.len() >= batch_size {
                            flush(&db, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&db, &mut buffer).await;
                        return;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline), if !buffer.is_empty() => {
                flush(&db, &mut buffer).await;
            }
            _ = shutdown.cancelled() => {
                receiver.close();
                while let Ok(record) = receiver.try_recv() {
                    buffer.push(record);
                }
                flush(&db, &mut buffer).await;
                return;
            }
        }
    }
}

async fn flush(db: &DatabaseConnection, buffer: &mut Vec<ExecutionRecord>) {
    if buffer.is_empty() {
        return;
    }

    let models = buffer
        .drain(..)
        .map(|rec| ActiveModel {
            execution_id: Set(rec.execution_id),
            schedule_id: Set(rec.schedule_id),
            correlation_id: Set(rec.correlation_id),
            topic: Set(rec.topic),
            entity_type: Set(rec.entity_type),
            action: Set(rec.action),
            scheduled_at: Set(rec.scheduled_at),
            executed_at: Set(rec.executed_at),
            delay_seconds: Set(rec.delay_seconds),
            status: Set(rec.status.as_str().to_string()),
            error_message: Set(rec.error_message),
            retry_count: Set(rec.retry_count),
            processing_time_ms: Set(rec.processing_time_ms),
            node_id: Set(rec.node_id),
        })
        .collect::<Vec<_>>();

    let batch_len = models.len();
    let result = Entity::insert_many(models)
        .on_conflict(OnConflict::column(Column::ExecutionId).do_nothing().to_owned())
        .on_empty_do_nothing()
        .exec(db)
        .await;

    if let Err(err) = result {
        tracing::error!(error = %err, batch_len, "failed to flush execution records, batch dropped");
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    /// In-memory sink for HotLoop scenario tests.
    #[derive(Default)]
    pub struct FakeAnalyticsSink {
        records: Mutex<Vec<ExecutionRecord>>,
    }

    impl FakeAnalyticsSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record(&self, record: ExecutionRecord) {
            self.records.lock().unwrap().push(record);
        }

        pub fn records(&self) -> Vec<ExecutionRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl AnalyticsRecorder for FakeAnalyticsSink {
        fn record(&self, record: ExecutionRecord) {
            FakeAnalyticsSink::record(self, record)
        }
    }
}
