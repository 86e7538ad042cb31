//! Activity domain types
//!
//! An activity is one execution run of a pipeline snapshot. It is created when
//! a run is requested and afterwards only mutated by the orchestrator (run,
//! rerun, approval) and by the sync engine (polling the backend).

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{Pipeline, Stage};

/// Backend job identity of one stage of one activity
///
/// `<pipelineName>_<stageName>_<activityId>`, unique per run.
pub fn job_name(pipeline_name: &str, stage_name: &str, activity_id: &str) -> String {
    format!("{}_{}_{}", pipeline_name, stage_name, activity_id)
}

/// Overall status of an activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    #[default]
    Waiting,
    /// Waiting on a manual approval before the next stage
    Pending,
    Building,
    Success,
    Fail,
    Denied,
}

impl ActivityStatus {
    /// Success, Fail and Denied never change again without a rerun
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActivityStatus::Success | ActivityStatus::Fail | ActivityStatus::Denied
        )
    }

    /// Waiting and Building activities still have backend work in flight
    pub fn is_running(self) -> bool {
        matches!(self, ActivityStatus::Waiting | ActivityStatus::Building)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Waiting => write!(f, "Waiting"),
            ActivityStatus::Pending => write!(f, "Pending"),
            ActivityStatus::Building => write!(f, "Building"),
            ActivityStatus::Success => write!(f, "Success"),
            ActivityStatus::Fail => write!(f, "Fail"),
            ActivityStatus::Denied => write!(f, "Denied"),
        }
    }
}

/// Status of one stage of an activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    #[default]
    Waiting,
    Pending,
    Building,
    Success,
    Fail,
    Denied,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Waiting => write!(f, "Waiting"),
            StageStatus::Pending => write!(f, "Pending"),
            StageStatus::Building => write!(f, "Building"),
            StageStatus::Success => write!(f, "Success"),
            StageStatus::Fail => write!(f, "Fail"),
            StageStatus::Denied => write!(f, "Denied"),
        }
    }
}

/// Status of one step of an activity stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    #[default]
    Waiting,
    Building,
    Success,
    Fail,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Fail)
    }
}

/// One execution run of a pipeline
///
/// Timestamps are milliseconds since the Unix epoch, durations are
/// milliseconds, matching what the backend reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub pipeline: Pipeline,
    pub run_sequence: u32,
    pub node_name: String,
    pub start_ts: i64,
    #[serde(default)]
    pub stop_ts: Option<i64>,
    /// Commit the source checkout resolved to, captured on first availability
    #[serde(default)]
    pub commit_info: Option<String>,
    pub status: ActivityStatus,
    /// Index of the stage waiting on approval
    #[serde(default)]
    pub pending_stage: Option<usize>,
    pub stages: Vec<ActivityStage>,
}

impl Activity {
    /// Derives a fresh activity from a pipeline snapshot
    ///
    /// Every stage and step starts out Waiting.
    pub fn new(id: String, pipeline: Pipeline, node_name: String, start_ts: i64) -> Self {
        let stages = pipeline.stages.iter().map(ActivityStage::from).collect();
        Self {
            id,
            run_sequence: pipeline.run_count + 1,
            pipeline,
            node_name,
            start_ts,
            stop_ts: None,
            commit_info: None,
            status: ActivityStatus::Waiting,
            pending_stage: None,
            stages,
        }
    }

    /// Backend job name of the stage at `ordinal`
    pub fn job_name(&self, ordinal: usize) -> Option<String> {
        self.pipeline
            .stages
            .get(ordinal)
            .map(|stage| job_name(&self.pipeline.name, &stage.name, &self.id))
    }

    /// Whether the activity has reached Success, Fail or Denied
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Mirror of one pipeline stage inside an activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityStage {
    pub name: String,
    pub need_approval: bool,
    #[serde(default)]
    pub approvers: Vec<String>,
    pub status: StageStatus,
    #[serde(default)]
    pub start_ts: i64,
    /// Sum of the step durations once the stage is terminal
    #[serde(default)]
    pub duration: i64,
    pub steps: Vec<ActivityStep>,
}

impl From<&Stage> for ActivityStage {
    fn from(stage: &Stage) -> Self {
        Self {
            name: stage.name.clone(),
            need_approval: stage.need_approval,
            approvers: stage.approvers.clone(),
            status: StageStatus::Waiting,
            start_ts: 0,
            duration: 0,
            steps: stage
                .steps
                .iter()
                .map(|step| ActivityStep {
                    name: step.name.clone(),
                    ..Default::default()
                })
                .collect(),
        }
    }
}

/// Mirror of one pipeline step inside an activity stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub start_ts: i64,
    #[serde(default)]
    pub duration: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::{SourceCheckout, Step, StepKind};

    fn pipeline() -> Pipeline {
        Pipeline {
            id: "p1".to_string(),
            name: "demo".to_string(),
            run_count: 4,
            stages: vec![
                Stage {
                    name: "checkout".to_string(),
                    steps: vec![Step::new(
                        "git",
                        StepKind::SourceCheckout(SourceCheckout::default()),
                    )],
                    ..Default::default()
                },
                Stage {
                    name: "build".to_string(),
                    need_approval: true,
                    steps: vec![],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_job_name_format() {
        assert_eq!(job_name("demo", "build", "abc123"), "demo_build_abc123");
    }

    #[test]
    fn test_new_activity_mirrors_stages() {
        let activity = Activity::new("abc123".to_string(), pipeline(), "node-1".to_string(), 10);

        assert_eq!(activity.run_sequence, 5);
        assert_eq!(activity.stages.len(), 2);
        assert_eq!(activity.stages[0].steps.len(), 1);
        assert_eq!(activity.stages[0].steps[0].status, StepStatus::Waiting);
        assert!(activity.stages[1].need_approval);
        assert_eq!(activity.status, ActivityStatus::Waiting);
        assert_eq!(activity.job_name(1).as_deref(), Some("demo_build_abc123"));
        assert_eq!(activity.job_name(2), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(ActivityStatus::Denied.is_terminal());
        assert!(!ActivityStatus::Pending.is_terminal());
        assert!(ActivityStatus::Waiting.is_running());
        assert!(!ActivityStatus::Pending.is_running());
    }
}
