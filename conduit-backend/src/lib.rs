//! Conduit Backend Client
//!
//! Boundary to the external job-execution backend that runs stage jobs on
//! worker nodes.
//!
//! The orchestrator talks to the backend exclusively through the
//! [`JobBackend`] trait. [`HttpBackend`] implements it over HTTP; tests use
//! scripted in-memory implementations.
//!
//! # Example
//!
//! ```no_run
//! use conduit_backend::{HttpBackend, JobBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), conduit_backend::BackendError> {
//!     let backend = HttpBackend::new("http://localhost:8081");
//!     let nodes = backend.active_nodes().await?;
//!     println!("{} node(s) online", nodes.len());
//!     Ok(())
//! }
//! ```

mod backend;
pub mod error;
mod jobs;
mod nodes;
pub mod spec;

pub use backend::JobBackend;
pub use error::{BackendError, Result};
pub use spec::{BuildInfo, JobInfo, JobSpec, ScmBinding, UpstreamTrigger};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the job-execution backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Base URL of the backend (e.g., "http://localhost:8081")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl HttpBackend {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds `<base>/<segments...>`, percent-encoding every segment
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BackendError::Parse(format!("invalid backend url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Parse("backend url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Builds `<base>/job/<name>/<segments...>`
    fn job_url(&self, name: &str, segments: &[&str]) -> Result<Url> {
        let mut all = Vec::with_capacity(segments.len() + 2);
        all.push("job");
        all.push(name);
        all.extend_from_slice(segments);
        self.url(&all)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = self.check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the raw body
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = self.check_status(response).await?;
        Ok(response.text().await?)
    }

    /// Check the status code, discarding the body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        self.check_status(response).await?;
        Ok(())
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::query_failed(status.as_u16(), error_text));
        }

        Ok(response)
    }
}
