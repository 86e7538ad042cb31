//! Job specification and query response types
//!
//! Only the subset of the backend's model the orchestrator depends on.

use serde::{Deserialize, Serialize};

/// Threshold an upstream build must reach to fire the downstream job
pub const SUCCESS_THRESHOLD: &str = "SUCCESS";

/// Executable definition of one backend job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Worker node the job is pinned to
    pub assigned_node: String,
    /// Workspace directory shared by every stage of an activity
    pub custom_workspace: String,
    /// Shell commands, run in order; the job fails on the first failing one
    pub commands: Vec<String>,
    /// Present only for single-step checkout stages
    pub scm: Option<ScmBinding>,
    /// Present only for stages that follow the previous one automatically
    pub upstream_trigger: Option<UpstreamTrigger>,
    /// Prefix every transcript line with the elapsed-time token
    pub timestamps: bool,
}

/// Source-control configuration of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmBinding {
    pub url: String,
    /// Branch name, or a commit id when the job is pinned to a revision
    pub branch: String,
}

/// Fires a job when its upstream job completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamTrigger {
    pub upstream_job_name: String,
    pub success_threshold: String,
    pub complete_build_only: bool,
}

impl UpstreamTrigger {
    /// Trigger that fires only on a successful, complete upstream build
    pub fn on_success(upstream_job_name: impl Into<String>) -> Self {
        Self {
            upstream_job_name: upstream_job_name.into(),
            success_threshold: SUCCESS_THRESHOLD.to_string(),
            complete_build_only: true,
        }
    }
}

/// Job existence and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    #[serde(default)]
    pub buildable: bool,
    #[serde(default)]
    pub in_queue: bool,
    #[serde(default)]
    pub last_build_number: Option<u64>,
}

/// Metadata of the most recent build of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub number: u64,
    pub building: bool,
    /// Start, milliseconds since the Unix epoch
    pub start_timestamp: i64,
    /// Duration in milliseconds, zero while building
    pub duration_ms: i64,
    /// Commit the source checkout resolved to
    pub resolved_revision: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_trigger_on_success() {
        let trigger = UpstreamTrigger::on_success("demo_build_abc");
        assert_eq!(trigger.upstream_job_name, "demo_build_abc");
        assert_eq!(trigger.success_threshold, "SUCCESS");
        assert!(trigger.complete_build_only);
    }
}
