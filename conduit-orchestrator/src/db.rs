use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Pipelines and activities are stored whole, one JSONB document per row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            kind VARCHAR(32) NOT NULL,
            id VARCHAR(255) NOT NULL,
            data JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (kind, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The poll ticker lists unfinished activities on every tick
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_objects_status ON objects(kind, (data->>'status'))",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
