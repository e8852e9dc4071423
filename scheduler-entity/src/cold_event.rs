use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "cold_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub schedule_id: String,
    pub topic: String,
    pub entity_type: String,
    pub action: String,
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub headers: Json,
    pub scheduled_at: DateTimeUtc,
    pub priority: i32,
    pub status: String,
    pub max_delay_seconds: i64,
    pub retry_count: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub processing_started_at: Option<DateTimeUtc>,
    pub node_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
