use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ScheduleId = String;
pub type NodeId = String;

/// Lifecycle of a [`ScheduledEvent`].
///
/// Valid transitions: `Pending -> Transferring -> Pending` (cold/hot
/// hand-off), `Pending -> Processing -> {Succeeded, Failed, Pending}`,
/// and `Pending -> Cancelled`. `Succeeded`, `Failed` and `Cancelled`
/// are terminal (eligible for `ColdStore::cleanup_expired`); `Failed`
/// is reachable only after retries are exhausted in `HotLoop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Transferring,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Transferring => "transferring",
            EventStatus::Processing => "processing",
            EventStatus::Succeeded => "succeeded",
            EventStatus::Failed => "failed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => EventStatus::Pending,
            "transferring" => EventStatus::Transferring,
            "processing" => EventStatus::Processing,
            "succeeded" => EventStatus::Succeeded,
            "failed" => EventStatus::Failed,
            "cancelled" => EventStatus::Cancelled,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventStatus::Succeeded | EventStatus::Failed | EventStatus::Cancelled
        )
    }
}

/// The unit of work flowing through the scheduler: an event with a
/// wall-clock firing time, tracked across the hot and cold tiers under
/// a single stable `schedule_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub schedule_id: ScheduleId,
    pub topic: String,
    pub entity_type: String,
    pub action: String,
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub scheduled_at: DateTime<Utc>,
    pub priority: i32,
    pub status: EventStatus,
    pub max_delay_seconds: i64,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub node_id: Option<NodeId>,
    pub error: Option<String>,
}

pub const DEFAULT_MAX_DELAY_SECONDS: i64 = 86400;

impl ScheduledEvent {
    /// Builds a new event in `pending` status, stamping `created_at`/
    /// `updated_at` from the given clock reading.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schedule_id: ScheduleId,
        topic: String,
        entity_type: String,
        action: String,
        body: Vec<u8>,
        correlation_id: Option<String>,
        headers: HashMap<String, String>,
        scheduled_at: DateTime<Utc>,
        priority: i32,
        max_delay_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id,
            topic,
            entity_type,
            action,
            body,
            correlation_id,
            headers,
            scheduled_at,
            priority,
            status: EventStatus::Pending,
            max_delay_seconds: max_delay_seconds.unwrap_or(DEFAULT_MAX_DELAY_SECONDS),
            retry_count: 0,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            node_id: None,
            error: None,
        }
    }

    /// The idempotency key for this event's entire lifecycle (see GLOSSARY).
    pub fn fingerprint(&self) -> &str {
        &self.schedule_id
    }

    /// Whether `other` describes the same logical event, ignoring
    /// lifecycle bookkeeping fields (`status`, `retry_count`,
    /// `updated_at`, `processing_started_at`, `node_id`, `error`).
    /// Used to decide whether a duplicate `schedule_id` is a safe
    /// idempotent re-ingest or a genuine `ConflictError`.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.schedule_id == other.schedule_id
            && self.topic == other.topic
            && self.entity_type == other.entity_type
            && self.action == other.action
            && self.body == other.body
            && self.correlation_id == other.correlation_id
            && self.headers == other.headers
            && self.scheduled_at == other.scheduled_at
            && self.priority == other.priority
            && self.max_delay_seconds == other.max_delay_seconds
    }

    pub fn delay_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.scheduled_at).num_seconds()
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.delay_seconds(now) > self.max_delay_seconds
    }
}

/// One outcome per execution attempt, appended to the analytics stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "success" => ExecutionStatus::Success,
            "error" => ExecutionStatus::Error,
            "timeout" => ExecutionStatus::Timeout,
            "skipped" => ExecutionStatus::Skipped,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub schedule_id: ScheduleId,
    pub correlation_id: Option<String>,
    pub topic: String,
    pub entity_type: String,
    pub action: String,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
    pub delay_seconds: i64,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub processing_time_ms: i64,
    pub node_id: NodeId,
}

impl ExecutionRecord {
    pub fn new(
        evt: &ScheduledEvent,
        executed_at: DateTime<Utc>,
        status: ExecutionStatus,
        error_message: Option<String>,
        processing_time_ms: i64,
        node_id: NodeId,
    ) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            schedule_id: evt.schedule_id.clone(),
            correlation_id: evt.correlation_id.clone(),
            topic: evt.topic.clone(),
            entity_type: evt.entity_type.clone(),
            action: evt.action.clone(),
            scheduled_at: evt.scheduled_at,
            executed_at,
            delay_seconds: evt.delay_seconds(executed_at),
            status,
            error_message,
            retry_count: evt.retry_count,
            processing_time_ms,
            node_id,
        }
    }
}
