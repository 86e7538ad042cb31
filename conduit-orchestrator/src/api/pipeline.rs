//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline definitions and starting runs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conduit_core::{Activity, Pipeline};
use conduit_engine::ActivityService;

use crate::api::error::ApiResult;

/// POST /pipeline/create
/// Validate and store a pipeline definition
pub async fn create_pipeline(
    State(service): State<ActivityService>,
    Json(pipeline): Json<Pipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!("Creating pipeline: {}", pipeline.name);

    let pipeline = service.save_pipeline(pipeline).await?;

    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipeline/{id}
/// Get pipeline by ID
pub async fn get_pipeline(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = service.get_pipeline(&id).await?;

    Ok(Json(pipeline))
}

/// POST /pipeline/{id}/run
/// Start a new activity of the pipeline
pub async fn run_pipeline(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    tracing::info!("Running pipeline: {}", id);

    let activity = service.run_pipeline(&id).await?;

    tracing::info!(
        "Pipeline {} started as activity {} on {}",
        id,
        activity.id,
        activity.node_name
    );
    Ok((StatusCode::CREATED, Json(activity)))
}
