//! Pipeline validation
//!
//! The orchestrator relies on these invariants (most importantly that the
//! first step of the first stage is the source checkout) without re-checking
//! them on every run.

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::pipeline::{Pipeline, Stage};
use crate::domain::step::{Step, StepKind};

/// Reasons a pipeline definition is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pipeline name cannot be empty")]
    EmptyName,

    #[error("source checkout must be the first step of the first stage")]
    MissingSourceCheckout,

    #[error("source checkout may only appear once, as the first step")]
    MisplacedSourceCheckout,

    #[error("stage name cannot be empty")]
    EmptyStageName,

    #[error("stage name '{0}' is duplicated")]
    DuplicateStageName(String),

    #[error("step '{step}': {reason}")]
    InvalidStep { step: String, reason: String },
}

/// Validates a pipeline definition
pub fn validate(pipeline: &Pipeline) -> Result<(), ValidationError> {
    if pipeline.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if pipeline.source_checkout().is_none() {
        return Err(ValidationError::MissingSourceCheckout);
    }

    check_stage_names(&pipeline.stages)?;

    for (stage_idx, stage) in pipeline.stages.iter().enumerate() {
        for (step_idx, step) in stage.steps.iter().enumerate() {
            let first = stage_idx == 0 && step_idx == 0;
            if !first && matches!(step.kind, StepKind::SourceCheckout(_)) {
                return Err(ValidationError::MisplacedSourceCheckout);
            }
            validate_step(step)?;
        }
    }

    Ok(())
}

fn check_stage_names(stages: &[Stage]) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for stage in stages {
        if stage.name.trim().is_empty() {
            return Err(ValidationError::EmptyStageName);
        }
        if !names.insert(stage.name.as_str()) {
            return Err(ValidationError::DuplicateStageName(stage.name.clone()));
        }
    }
    Ok(())
}

fn validate_step(step: &Step) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidStep {
        step: step.name.clone(),
        reason: reason.to_string(),
    };

    match &step.kind {
        StepKind::SourceCheckout(checkout) => {
            if checkout.repository.is_empty() {
                return Err(invalid("repository cannot be empty"));
            }
            if checkout.branch.is_empty() {
                return Err(invalid("branch cannot be empty"));
            }
            if !checkout.repository.ends_with(".git") {
                return Err(invalid("repository must be a .git url"));
            }
        }
        StepKind::ContainerTask(task) => {
            if task.image.is_empty() {
                return Err(invalid("image cannot be empty"));
            }
            if task.is_service && task.alias.as_deref().unwrap_or("").is_empty() {
                return Err(invalid("service steps need an alias"));
            }
        }
        StepKind::ImageBuild(build) => {
            if build.target_image.is_empty() {
                return Err(invalid("target image cannot be empty"));
            }
        }
        StepKind::ServiceUpgrade(upgrade) => {
            if upgrade.image_tag.is_empty() {
                return Err(invalid("image cannot be empty"));
            }
            if upgrade.selector.is_empty() {
                return Err(invalid("service selector cannot be empty"));
            }
        }
        StepKind::StackUpgrade(upgrade) => {
            if upgrade.stack_name.is_empty() {
                return Err(invalid("stack name cannot be empty"));
            }
        }
        StepKind::CatalogUpgrade(_) | StepKind::Deploy(_) => {}
    }

    Ok(())
}
