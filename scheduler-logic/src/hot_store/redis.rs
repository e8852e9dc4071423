use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::AsyncCommands;

use super::{HotStore, ReleaseOutcome};
use crate::{
    error::{Result, SchedulerError},
    model::{EventStatus, ScheduledEvent},
    settings::PRIORITY_WEIGHT,
};

/// Redis-backed `HotStore`: a sorted set of due entries plus a hash of
/// full payloads, the way `recache::stores::redis::RedisStore` pairs a
/// Redis primitive with JSON-serialized values. A second sorted set
/// tracks in-flight claims so the reaper can find them without
/// scanning the payload hash.
#[derive(Clone)]
pub struct RedisHotStore {
    connection: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisHotStore {
    pub async fn new(
        connection_string: impl Into<String>,
        prefix: impl Into<String>,
    ) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string.into())?;
        let connection = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            prefix: prefix.into(),
        })
    }

    fn due_key(&self) -> String {
        format!("{}:hot:due", self.prefix)
    }

    fn events_key(&self) -> String {
        format!("{}:hot:events", self.prefix)
    }

    fn processing_key(&self) -> String {
        format!("{}:hot:processing", self.prefix)
    }

    fn score_of(evt: &ScheduledEvent) -> f64 {
        (evt.scheduled_at.timestamp_micros() - evt.priority as i64 * PRIORITY_WEIGHT) as f64
    }

    fn serialize(evt: &ScheduledEvent) -> Result<String> {
        serde_json::to_string(evt)
            .map_err(|e| SchedulerError::TransientStore(format!("serialize event: {e}")))
    }

    fn deserialize(payload: &str) -> Result<ScheduledEvent> {
        serde_json::from_str(payload)
            .map_err(|e| SchedulerError::TransientStore(format!("deserialize event: {e}")))
    }
}

#[async_trait]
impl HotStore for RedisHotStore {
    async fn add(&self, evt: &ScheduledEvent) -> Result<()> {
        let script = redis::Script::new(
            r#"
            local existing = redis.call('HGET', KEYS[2], ARGV[1])
            if existing then
                return {1, existing}
            end
            redis.call('HSET', KEYS[2], ARGV[1], ARGV[3])
            redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
            return {0, false}
            "#,
        );

        let mut conn = self.connection.clone();
        let payload = Self::serialize(evt)?;
        let (exists, existing_payload): (i64, Option<String>) = script
            .key(self.due_key())
            .key(self.events_key())
            .arg(&evt.schedule_id)
            .arg(Self::score_of(evt))
            .arg(&payload)
            .invoke_async(&mut conn)
            .await?;

        if exists == 1 {
            let existing = Self::deserialize(&existing_payload.unwrap_or_default())?;
            if existing.content_eq(evt) {
                return Ok(());
            }
            return Err(SchedulerError::Conflict {
                schedule_id: evt.schedule_id.clone(),
            });
        }
        Ok(())
    }

    async fn peek_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<ScheduledEvent>> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn
            .zrangebyscore_limit(
                self.due_key(),
                "-inf",
                now.timestamp_micros(),
                0,
                limit as isize,
            )
            .await?;

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let payloads: Vec<Option<String>> = conn.hget(self.events_key(), &ids[..]).await?;
        payloads
            .into_iter()
            .flatten()
            .map(|p| Self::deserialize(&p))
            .collect()
    }

    async fn claim(
        &self,
        schedule_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledEvent>> {
        let script = redis::Script::new(
            r#"
            local payload = redis.call('HGET', KEYS[2], ARGV[1])
            if not payload then return false end
            local score = redis.call('ZSCORE', KEYS[1], ARGV[1])
            if not score then return false end
            redis.call('ZREM', KEYS[1], ARGV[1])
            return payload
            "#,
        );

        let mut conn = self.connection.clone();
        let payload: Option<String> = script
            .key(self.due_key())
            .key(self.events_key())
            .arg(schedule_id)
            .invoke_async(&mut conn)
            .await?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let mut evt = Self::deserialize(&payload)?;
        evt.status = EventStatus::Processing;
        evt.processing_started_at = Some(now);
        evt.node_id = Some(node_id.to_string());
        evt.updated_at = now;

        let rewritten = Self::serialize(&evt)?;
        let _: () = conn.hset(self.events_key(), schedule_id, rewritten).await?;
        let _: () = conn
            .zadd(self.processing_key(), schedule_id, now.timestamp_micros())
            .await?;

        Ok(Some(evt))
    }

    async fn release(
        &self,
        schedule_id: &str,
        now: DateTime<Utc>,
        outcome: ReleaseOutcome,
    ) -> Result<()> {
        let mut conn = self.connection.clone();

        match outcome {
            ReleaseOutcome::Succeeded | ReleaseOutcome::Failed => {
                let _: () = conn.hdel(self.events_key(), schedule_id).await?;
                let _: () = conn.zrem(self.processing_key(), schedule_id).await?;
            }
            ReleaseOutcome::Requeue {
                delay,
                retry_count,
                error,
            } => {
                let payload: Option<String> = conn.hget(self.events_key(), schedule_id).await?;
                let Some(payload) = payload else {
                    return Err(SchedulerError::NotFound(schedule_id.to_string()));
                };
                let mut evt = Self::deserialize(&payload)?;
                evt.status = EventStatus::Pending;
                evt.processing_started_at = None;
                evt.node_id = None;
                evt.retry_count = retry_count;
                evt.error = error;
                evt.updated_at = now;

                let new_due_at = now + delay;
                let score =
                    (new_due_at.timestamp_micros() - evt.priority as i64 * PRIORITY_WEIGHT) as f64;

                let rewritten = Self::serialize(&evt)?;
                let _: () = conn.hset(self.events_key(), schedule_id, rewritten).await?;
                let _: () = conn.zadd(self.due_key(), schedule_id, score).await?;
                let _: () = conn.zrem(self.processing_key(), schedule_id).await?;
            }
        }
        Ok(())
    }

    async fn cancel(&self, schedule_id: &str) -> Result<bool> {
        let script = redis::Script::new(
            r#"
            local score = redis.call('ZSCORE', KEYS[1], ARGV[1])
            if not score then return 0 end
            redis.call('ZREM', KEYS[1], ARGV[1])
            redis.call('HDEL', KEYS[2], ARGV[1])
            return 1
            "#,
        );

        let mut conn = self.connection.clone();
        let removed: i64 = script
            .key(self.due_key())
            .key(self.events_key())
            .arg(schedule_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn count_pending(&self) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn.zcard(self.due_key()).await?;
        Ok(count)
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn
            .zcount(self.due_key(), "-inf", now.timestamp_micros())
            .await?;
        Ok(count)
    }

    async fn count_processing(&self) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn.zcard(self.processing_key()).await?;
        Ok(count)
    }

    async fn reap_stale(
        &self,
        now: DateTime<Utc>,
        stale_after: ChronoDuration,
    ) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let threshold = (now - stale_after).timestamp_micros();

        let stale_ids: Vec<String> = conn
            .zrangebyscore(self.processing_key(), "-inf", threshold)
            .await?;

        let mut reaped = vec![];
        for id in stale_ids {
            let payload: Option<String> = conn.hget(self.events_key(), &id).await?;
            let Some(payload) = payload else {
                let _: () = conn.zrem(self.processing_key(), &id).await?;
                continue;
            };
            let mut evt = Self::deserialize(&payload)?;
            if evt.status != EventStatus::Processing {
                let _: () = conn.zrem(self.processing_key(), &id).await?;
                continue;
            }

            evt.status = EventStatus::Pending;
            evt.processing_started_at = None;
            evt.node_id = None;
            evt.updated_at = now;

            let rewritten = Self::serialize(&evt)?;
            let _: () = conn.hset(self.events_key(), &id, rewritten).await?;
            let _: () = conn.zadd(self.due_key(), &id, Self::score_of(&evt)).await?;
            let _: () = conn.zrem(self.processing_key(), &id).await?;
            reaped.push(id);
        }

        Ok(reaped)
    }
}
