//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod activity;
pub mod error;
pub mod events;
pub mod health;
pub mod pipeline;

use axum::{
    Router,
    routing::{delete, get, post},
};
use conduit_engine::ActivityService;
use tower_http::trace::TraceLayer;

/// Create the main API router with all endpoints
pub fn create_router(service: ActivityService) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/pipeline/{id}/run", post(pipeline::run_pipeline))
        // Activity endpoints
        .route("/activity/{id}", get(activity::get_activity))
        .route("/activity/{id}/rerun", post(activity::rerun_activity))
        .route("/activity/{id}/approve", post(activity::approve_activity))
        .route("/activity/{id}/deny", post(activity::deny_activity))
        .route("/activity/{id}/builds", delete(activity::delete_builds))
        .route(
            "/activity/{id}/stage/{stage}/step/{step}/log",
            get(activity::get_step_log),
        )
        // Backend callbacks
        .route("/activity/{id}/step", post(events::report_step))
        // Add state and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}
