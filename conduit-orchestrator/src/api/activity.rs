//! Activity API Handlers
//!
//! HTTP endpoints acting on a single activity.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conduit_core::Activity;
use conduit_engine::ActivityService;

use crate::api::error::ApiResult;

/// GET /activity/{id}
/// Get activity by ID
pub async fn get_activity(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    tracing::debug!("Getting activity: {}", id);

    Ok(Json(service.get_activity(&id).await?))
}

/// POST /activity/{id}/rerun
/// Run a finished activity again from its first stage
pub async fn rerun_activity(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    tracing::info!("Rerunning activity: {}", id);

    Ok(Json(service.rerun(&id).await?))
}

/// POST /activity/{id}/approve
/// Start the stage waiting on approval
pub async fn approve_activity(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    tracing::info!("Approving activity: {}", id);

    Ok(Json(service.approve(&id).await?))
}

/// POST /activity/{id}/deny
/// Stop the activity at the stage waiting on approval
pub async fn deny_activity(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    tracing::info!("Denying activity: {}", id);

    Ok(Json(service.deny(&id).await?))
}

/// DELETE /activity/{id}/builds
/// Remove the backend builds of every finished stage
pub async fn delete_builds(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting builds of activity: {}", id);

    service.delete_builds(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /activity/{id}/stage/{stage}/step/{step}/log
/// Transcript of a single step
pub async fn get_step_log(
    State(service): State<ActivityService>,
    Path((id, stage, step)): Path<(String, usize, usize)>,
) -> ApiResult<String> {
    tracing::debug!("Getting log of step {}/{} of activity {}", stage, step, id);

    Ok(service.step_log(&id, stage, step).await?)
}
