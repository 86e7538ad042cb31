//! Conduit Core
//!
//! Core types shared by the Conduit CI/CD orchestrator.
//!
//! This crate contains:
//! - Domain types: pipelines, stages, steps and the activities derived from them
//! - The closed set of environment variables exported to every step
//! - Pipeline validation

pub mod domain;
pub mod env;
pub mod validate;

pub use domain::activity::{
    Activity, ActivityStage, ActivityStatus, ActivityStep, StageStatus, StepStatus, job_name,
};
pub use domain::pipeline::{NotificationSettings, Pipeline, Stage};
pub use domain::step::{Step, StepKind};
pub use validate::{ValidationError, validate};
