use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            CREATE TABLE "cold_events" (
                "schedule_id" text PRIMARY KEY,
                "topic" text NOT NULL,
                "entity_type" text NOT NULL,
                "action" text NOT NULL,
                "body" bytea NOT NULL,
                "correlation_id" text,
                "headers" jsonb NOT NULL DEFAULT '{}'::jsonb,
                "scheduled_at" timestamptz NOT NULL,
                "priority" integer NOT NULL DEFAULT 0,
                "status" text NOT NULL,
                "max_delay_seconds" bigint NOT NULL DEFAULT 86400,
                "retry_count" integer NOT NULL DEFAULT 0,
                "created_at" timestamptz NOT NULL,
                "updated_at" timestamptz NOT NULL,
                "processing_started_at" timestamptz,
                "node_id" text,
                "error" text
            );

            -- scan_due_for_transfer and the cleanup reaper both filter by
            -- (status, scheduled_at); this is the only index the hot path needs.
            CREATE INDEX "idx_cold_events_status_scheduled_at"
                ON "cold_events" ("status", "scheduled_at");

            CREATE INDEX "idx_cold_events_updated_at"
                ON "cold_events" ("updated_at");

            COMMENT ON TABLE "cold_events" IS
                'Durable cold-tier copy of scheduled events. In production this table is partitioned by toYYYYMMDD(scheduled_at) on a columnar store; here it is a single indexed Postgres table.';

            CREATE TABLE "execution_records" (
                "execution_id" text PRIMARY KEY,
                "schedule_id" text NOT NULL,
                "correlation_id" text,
                "topic" text NOT NULL,
                "entity_type" text NOT NULL,
                "action" text NOT NULL,
                "scheduled_at" timestamptz NOT NULL,
                "executed_at" timestamptz NOT NULL,
                "delay_seconds" bigint NOT NULL,
                "status" text NOT NULL,
                "error_message" text,
                "retry_count" integer NOT NULL,
                "processing_time_ms" bigint NOT NULL,
                "node_id" text NOT NULL
            );

            CREATE INDEX "idx_execution_records_schedule_id"
                ON "execution_records" ("schedule_id");

            CREATE INDEX "idx_execution_records_executed_at"
                ON "execution_records" ("executed_at");

            COMMENT ON TABLE "execution_records" IS
                'Append-only analytics record, one row per execution attempt. '
                'Partitioned by toYYYYMMDD(executed_at) in production.';
        "#;
        crate::from_sql(manager, sql).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            DROP TABLE "execution_records";
            DROP TABLE "cold_events";
        "#;

        crate::from_sql(manager, sql).await
    }
}
