//! Backend abstraction
//!
//! Every call is a single request from the caller's perspective. Failures are
//! surfaced immediately; retrying is left to whoever drives the orchestrator.

use async_trait::async_trait;

use crate::HttpBackend;
use crate::error::Result;
use crate::spec::{BuildInfo, JobInfo, JobSpec};

/// The job-execution backend as seen by the orchestrator
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Names of the worker nodes that can currently run jobs
    async fn active_nodes(&self) -> Result<Vec<String>>;

    /// Provision a job
    async fn create_job(&self, name: &str, spec: &JobSpec) -> Result<()>;

    /// Replace the specification of an existing job
    async fn update_job(&self, name: &str, spec: &JobSpec) -> Result<()>;

    /// Trigger execution of a provisioned job
    async fn start_job(&self, name: &str) -> Result<()>;

    /// Job existence and metadata
    async fn job_info(&self, name: &str) -> Result<JobInfo>;

    /// Most recent build of a job, `None` if none was started yet
    async fn last_build(&self, name: &str) -> Result<Option<BuildInfo>>;

    /// Raw execution transcript of the most recent build
    async fn console_text(&self, name: &str) -> Result<String>;

    /// Remove the most recent build of a job
    async fn delete_last_build(&self, name: &str) -> Result<()>;

    /// Execute a shell command on a worker node
    async fn run_on_node(&self, node: &str, command: &str) -> Result<String>;
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn active_nodes(&self) -> Result<Vec<String>> {
        HttpBackend::active_nodes(self).await
    }

    async fn create_job(&self, name: &str, spec: &JobSpec) -> Result<()> {
        HttpBackend::create_job(self, name, spec).await
    }

    async fn update_job(&self, name: &str, spec: &JobSpec) -> Result<()> {
        HttpBackend::update_job(self, name, spec).await
    }

    async fn start_job(&self, name: &str) -> Result<()> {
        HttpBackend::start_job(self, name).await
    }

    async fn job_info(&self, name: &str) -> Result<JobInfo> {
        HttpBackend::job_info(self, name).await
    }

    async fn last_build(&self, name: &str) -> Result<Option<BuildInfo>> {
        HttpBackend::last_build(self, name).await
    }

    async fn console_text(&self, name: &str) -> Result<String> {
        HttpBackend::console_text(self, name).await
    }

    async fn delete_last_build(&self, name: &str) -> Result<()> {
        HttpBackend::delete_last_build(self, name).await
    }

    async fn run_on_node(&self, node: &str, command: &str) -> Result<String> {
        HttpBackend::run_on_node(self, node, command).await
    }
}
