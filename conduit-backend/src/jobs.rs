//! Job-related backend endpoints

use serde::Deserialize;

use crate::HttpBackend;
use crate::error::Result;
use crate::spec::{BuildInfo, JobInfo, JobSpec};

/// Elapsed-time format requested for transcript lines (`00h00m01s234ms`)
const ELAPSED_FORMAT: &str = "HH'h'mm'm'ss's'SSS'ms'";

/// Build metadata as the backend reports it
#[derive(Debug, Deserialize)]
struct BuildPayload {
    number: u64,
    #[serde(default)]
    building: bool,
    timestamp: i64,
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    actions: Vec<BuildAction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildAction {
    #[serde(default)]
    last_built_revision: Option<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    #[serde(rename = "SHA1", default)]
    sha1: String,
}

impl From<BuildPayload> for BuildInfo {
    fn from(payload: BuildPayload) -> Self {
        let resolved_revision = payload
            .actions
            .into_iter()
            .filter_map(|action| action.last_built_revision)
            .map(|revision| revision.sha1)
            .filter(|sha| !sha.is_empty())
            .last();

        Self {
            number: payload.number,
            building: payload.building,
            start_timestamp: payload.timestamp,
            duration_ms: payload.duration,
            resolved_revision,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPayload {
    name: String,
    #[serde(default)]
    buildable: bool,
    #[serde(default)]
    in_queue: bool,
    #[serde(default)]
    last_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    number: u64,
}

impl HttpBackend {
    // =============================================================================
    // Job Provisioning
    // =============================================================================

    /// Create a job from its specification
    pub async fn create_job(&self, name: &str, spec: &JobSpec) -> Result<()> {
        let mut url = self.url(&["createItem"])?;
        url.query_pairs_mut().append_pair("name", name);
        tracing::debug!("Creating backend job {}", name);

        let response = self.client.post(url).json(spec).send().await?;
        self.handle_empty_response(response).await
    }

    /// Replace the specification of an existing job
    pub async fn update_job(&self, name: &str, spec: &JobSpec) -> Result<()> {
        let url = self.job_url(name, &["config"])?;
        tracing::debug!("Updating backend job {}", name);

        let response = self.client.post(url).json(spec).send().await?;
        self.handle_empty_response(response).await
    }

    /// Queue a build of a job
    pub async fn start_job(&self, name: &str) -> Result<()> {
        let url = self.job_url(name, &["build"])?;
        tracing::debug!("Starting backend job {}", name);

        let response = self.client.post(url).send().await?;
        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Job Queries
    // =============================================================================

    /// Get job existence and metadata
    pub async fn job_info(&self, name: &str) -> Result<JobInfo> {
        let url = self.job_url(name, &["api", "json"])?;
        let response = self.client.get(url).send().await?;

        let payload: JobPayload = self.handle_response(response).await?;
        Ok(JobInfo {
            name: payload.name,
            buildable: payload.buildable,
            in_queue: payload.in_queue,
            last_build_number: payload.last_build.map(|build| build.number),
        })
    }

    /// Get the most recent build of a job, `None` if it never ran
    pub async fn last_build(&self, name: &str) -> Result<Option<BuildInfo>> {
        let url = self.job_url(name, &["lastBuild", "api", "json"])?;
        let response = self.client.get(url).send().await?;

        match self.handle_response::<BuildPayload>(response).await {
            Ok(payload) => Ok(Some(payload.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the raw, timestamped transcript of the most recent build
    pub async fn console_text(&self, name: &str) -> Result<String> {
        let mut url = self.job_url(name, &["lastBuild", "timestamps", ""])?;
        url.query_pairs_mut()
            .append_pair("elapsed", ELAPSED_FORMAT)
            .append_key_only("appendLog");

        let response = self.client.get(url).send().await?;
        self.handle_text_response(response).await
    }

    /// Delete the most recent build of a job
    pub async fn delete_last_build(&self, name: &str) -> Result<()> {
        let url = self.job_url(name, &["lastBuild", "doDelete"])?;
        tracing::debug!("Deleting last build of {}", name);

        let response = self.client.post(url).send().await?;
        self.handle_empty_response(response).await
    }
}
