use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_entity::cold_event::{ActiveModel, Column, Entity, Model};
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};

use super::ColdStore;
use crate::{
    error::{Result, SchedulerError},
    model::{EventStatus, ScheduledEvent},
};

/// Postgres-backed `ColdStore` via sea-orm, in the free-function-over-
/// connection style of `celestia::repository`'s modules, wrapped in a
/// struct so it can be named as a trait object.
#[derive(Clone)]
pub struct PostgresColdStore {
    db: DatabaseConnection,
}

impl PostgresColdStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_event(m: Model) -> Result<ScheduledEvent> {
    let status = EventStatus::parse(&m.status)
        .ok_or_else(|| SchedulerError::TransientStore(format!("unknown status {}", m.status)))?;
    let headers: HashMap<String, String> = serde_json::from_value(m.headers)
        .map_err(|e| SchedulerError::TransientStore(format!("decode headers: {e}")))?;
    Ok(ScheduledEvent {
        schedule_id: m.schedule_id,
        topic: m.topic,
        entity_type: m.entity_type,
        action: m.action,
        body: m.body,
        correlation_id: m.correlation_id,
        headers,
        scheduled_at: m.scheduled_at,
        priority: m.priority,
        status,
        max_delay_seconds: m.max_delay_seconds,
        retry_count: m.retry_count,
        created_at: m.created_at,
        updated_at: m.updated_at,
        processing_started_at: m.processing_started_at,
        node_id: m.node_id,
        error: m.error,
    })
}

fn event_to_active_model(evt: &ScheduledEvent) -> Result<ActiveModel> {
    let headers = serde_json::to_value(&evt.headers)
        .map_err(|e| SchedulerError::TransientStore(format!("encode headers: {e}")))?;
    Ok(ActiveModel {
        schedule_id: Set(evt.schedule_id.clone()),
        topic: Set(evt.topic.clone()),
        entity_type: Set(evt.entity_type.clone()),
        action: Set(evt.action.clone()),
        body: Set(evt.body.clone()),
        correlation_id: Set(evt.correlation_id.clone()),
        headers: Set(headers),
        scheduled_at: Set(evt.scheduled_at),
        priority: Set(evt.priority),
        status: Set(evt.status.as_str().to_string()),
        max_delay_seconds: Set(evt.max_delay_seconds),
        retry_count: Set(evt.retry_count),
        created_at: Set(evt.created_at),
        updated_at: Set(evt.updated_at),
        processing_started_at: Set(evt.processing_started_at),
        node_id: Set(evt.node_id.clone()),
        error: Set(evt.error.clone()),
    })
}

/// Executes `UPDATE cold_events SET status = $to, ... WHERE schedule_id
/// = $id AND status = $from`, returning whether a row actually
/// transitioned.
async fn guarded_transition(
    db: &DatabaseConnection,
    schedule_id: &str,
    from: EventStatus,
    to: EventStatus,
    now: DateTime<Utc>,
    extra_set: &str,
) -> Result<bool> {
    let sql = format!(
        "UPDATE cold_events SET status = $1, updated_at = $2{extra_set} \
         WHERE schedule_id = $3 AND status = $4"
    );
    let stmt = Statement::from_sql_and_values(
        db.get_database_backend(),
        &sql,
        [
            to.as_str().into(),
            now.into(),
            schedule_id.into(),
            from.as_str().into(),
        ],
    );
    let result = db.execute(stmt).await?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl ColdStore for PostgresColdStore {
    async fn insert(&self, evt: &ScheduledEvent) -> Result<()> {
        let active = event_to_active_model(evt)?;
        match Entity::insert(active)
            .on_conflict(OnConflict::column(Column::ScheduleId).do_nothing().to_owned())
            .exec(&self.db)
            .await
        {
            Ok(_) | Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn scan_due_for_transfer(
        &self,
        now: DateTime<Utc>,
        horizon_seconds: i64,
        limit: u64,
    ) -> Result<Vec<ScheduledEvent>> {
        let cutoff = now + chrono::Duration::seconds(horizon_seconds);
        let rows = Entity::find()
            .filter(Column::Status.eq(EventStatus::Pending.as_str()))
            .filter(Column::ScheduledAt.lte(cutoff))
            .order_by_asc(Column::ScheduledAt)
            .order_by_desc(Column::Priority)
            .limit(limit)
            .all(&self.db)
            .await?;
        rows.into_iter().map(model_to_event).collect()
    }

    async fn mark_transferring(
        &self,
        schedule_id: &str,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = "UPDATE cold_events SET status = $1, updated_at = $2, node_id = $3 \
                   WHERE schedule_id = $4 AND status = $5";
        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            sql,
            [
                EventStatus::Transferring.as_str().into(),
                now.into(),
                node_id.into(),
                schedule_id.into(),
                EventStatus::Pending.as_str().into(),
            ],
        );
        let result = self.db.execute(stmt).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn finalize_transferred(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
        guarded_transition(
            &self.db,
            schedule_id,
            EventStatus::Transferring,
            EventStatus::Succeeded,
            now,
            "",
        )
        .await
    }

    async fn revert_transfer(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
        guarded_transition(
            &self.db,
            schedule_id,
            EventStatus::Transferring,
            EventStatus::Pending,
            now,
            ", node_id = NULL",
        )
        .await
    }

    async fn cancel(&self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
        guarded_transition(
            &self.db,
            schedule_id,
            EventStatus::Pending,
            EventStatus::Cancelled,
            now,
            "",
        )
        .await
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>, ttl_days: i64) -> Result<u64> {
        let cutoff = now - chrono::Duration::days(ttl_days);
        let result = Entity::delete_many()
            .filter(
                Column::Status
                    .eq(EventStatus::Succeeded.as_str())
                    .or(Column::Status.eq(EventStatus::Failed.as_str()))
                    .or(Column::Status.eq(EventStatus::Cancelled.as_str())),
            )
            .filter(Column::UpdatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find(&self, schedule_id: &str) -> Result<Option<ScheduledEvent>> {
        let row = Entity::find_by_id(schedule_id.to_string())
            .one(&self.db)
            .await?;
        row.map(model_to_event).transpose()
    }

    async fn count_pending(&self) -> Result<u64> {
        let count = Entity::find()
            .filter(Column::Status.eq(EventStatus::Pending.as_str()))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}
