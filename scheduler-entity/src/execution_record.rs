use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "execution_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub execution_id: String,
    pub schedule_id: String,
    pub correlation_id: Option<String>,
    pub topic: String,
    pub entity_type: String,
    pub action: String,
    pub scheduled_at: DateTimeUtc,
    pub executed_at: DateTimeUtc,
    pub delay_seconds: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub processing_time_ms: i64,
    pub node_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
