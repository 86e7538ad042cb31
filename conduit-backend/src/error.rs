//! Error types for the job backend client

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur when talking to the job-execution backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure: the backend could not be reached at all
    #[error("backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The backend answered with a non-success status code
    #[error("backend query failed (status {status}): {message}")]
    QueryFailed {
        /// HTTP status code
        status: u16,
        /// Error body returned by the backend
        message: String,
    },

    /// The backend answered with a body we could not interpret
    #[error("failed to parse backend response: {0}")]
    Parse(String),
}

impl BackendError {
    /// Create a query error from status code and message
    pub fn query_failed(status: u16, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            status,
            message: message.into(),
        }
    }

    /// Check if the backend reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::QueryFailed { status: 404, .. })
    }

    /// Check if this is a transport level failure
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
