//! Step Callback Handler
//!
//! Receives step progress reports from the backend.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conduit_engine::{ActivityService, StepEvent};

use crate::api::error::ApiResult;

/// POST /activity/{id}/step
/// Record a step start or finish and queue a sync of the activity
pub async fn report_step(
    State(service): State<ActivityService>,
    Path(id): Path<String>,
    Json(event): Json<StepEvent>,
) -> ApiResult<StatusCode> {
    tracing::debug!(
        "Step {}/{} of activity {}: {:?}",
        event.stage,
        event.step,
        id,
        event.outcome
    );

    service.step_event(&id, event).await?;

    Ok(StatusCode::ACCEPTED)
}
