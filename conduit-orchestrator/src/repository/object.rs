//! Object Repository
//!
//! Pipelines and activities live in the `objects` table as JSONB documents
//! keyed by kind and id. Every write replaces the whole document.

use async_trait::async_trait;
use conduit_core::{Activity, ActivityStatus, Pipeline};
use conduit_engine::{ActivityStore, EngineError, Result};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::PgPool;

const PIPELINE: &str = "pipeline";
const ACTIVITY: &str = "activity";

/// Terminal activity statuses as serialized in `data->>'status'`
const TERMINAL: [ActivityStatus; 3] = [
    ActivityStatus::Success,
    ActivityStatus::Fail,
    ActivityStatus::Denied,
];

/// [`ActivityStore`] backed by Postgres
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>> {
        let data: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM objects WHERE kind = $1 AND id = $2")
                .bind(kind)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        data.map(|value| {
            serde_json::from_value(value)
                .map_err(|e| EngineError::Store(format!("corrupt {} {}: {}", kind, id, e)))
        })
        .transpose()
    }

    async fn put<T: Serialize>(&self, kind: &str, id: &str, object: &T) -> Result<()> {
        let data = serde_json::to_value(object)
            .map_err(|e| EngineError::Store(format!("failed to encode {} {}: {}", kind, id, e)))?;

        sqlx::query(
            r#"
            INSERT INTO objects (kind, id, data, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(data)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn get_activity(&self, id: &str) -> Result<Option<Activity>> {
        self.get(ACTIVITY, id).await
    }

    async fn put_activity(&self, activity: &Activity) -> Result<()> {
        self.put(ACTIVITY, &activity.id, activity).await
    }

    async fn list_active_activities(&self) -> Result<Vec<Activity>> {
        let terminal: Vec<String> = TERMINAL.iter().map(ToString::to_string).collect();

        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT data FROM objects
            WHERE kind = $1 AND NOT (data->>'status' = ANY($2))
            ORDER BY updated_at
            "#,
        )
        .bind(ACTIVITY)
        .bind(&terminal)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut activities = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<Activity>(row) {
                Ok(activity) => activities.push(activity),
                Err(e) => tracing::warn!("Skipping unreadable activity: {}", e),
            }
        }
        Ok(activities)
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>> {
        self.get(PIPELINE, id).await
    }

    async fn put_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        self.put(PIPELINE, &pipeline.id, pipeline).await
    }
}

fn store_error(err: sqlx::Error) -> EngineError {
    tracing::error!("Database error: {:?}", err);
    EngineError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_match_serialized_form() {
        for status in TERMINAL {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, serde_json::Value::String(status.to_string()));
            assert!(status.is_terminal());
        }
    }
}
