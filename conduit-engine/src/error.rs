//! Engine error types

use conduit_backend::BackendError;
use conduit_core::ValidationError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the orchestration engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The worker pool is empty or could not be listed
    #[error("no available worker node to run on")]
    NoAvailableNode,

    /// The pipeline defines zero stages
    #[error("no stage in pipeline definition to run")]
    NoStages,

    /// Cleanup was attempted on an activity that is still Waiting or Building
    #[error("activity {0} is still running")]
    ActivityStillRunning(String),

    /// Transport failure talking to the backend
    #[error("backend unreachable: {0}")]
    BackendUnreachable(#[source] BackendError),

    /// The backend rejected a request or answered with garbage
    #[error("backend query failed: {0}")]
    BackendQueryFailed(#[source] BackendError),

    /// A stage or step ordinal is out of range
    #[error("invalid step index (stage {stage}, step {step:?})")]
    InvalidStepIndex { stage: usize, step: Option<usize> },

    /// The activity is not in a state that allows the operation
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(String),
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        if err.is_unreachable() {
            EngineError::BackendUnreachable(err)
        } else {
            EngineError::BackendQueryFailed(err)
        }
    }
}

impl EngineError {
    pub fn stage_index(stage: usize) -> Self {
        EngineError::InvalidStepIndex { stage, step: None }
    }

    pub fn step_index(stage: usize, step: usize) -> Self {
        EngineError::InvalidStepIndex {
            stage,
            step: Some(step),
        }
    }
}
