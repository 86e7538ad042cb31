//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::activity::ActivityStatus;
use crate::domain::step::Step;

/// Pipeline definition
///
/// Owned by the user. Once an activity is derived from it the activity keeps
/// its own copy, so later edits never affect a run in flight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub run_count: u32,
    #[serde(default)]
    pub last_run_id: Option<String>,
    #[serde(default)]
    pub last_run_status: Option<ActivityStatus>,
    #[serde(default)]
    pub last_run_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification: NotificationSettings,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Source checkout step of the pipeline, if the definition is well formed
    pub fn source_checkout(&self) -> Option<&crate::domain::step::SourceCheckout> {
        self.stages
            .first()
            .and_then(|stage| stage.steps.first())
            .and_then(|step| match &step.kind {
                crate::domain::step::StepKind::SourceCheckout(checkout) => Some(checkout),
                _ => None,
            })
    }
}

/// Notification options of a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
    #[serde(default)]
    pub notify_committer: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// An ordered phase of a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Blocks automatic progression from the previous stage
    #[serde(default)]
    pub need_approval: bool,
    #[serde(default)]
    pub approvers: Vec<String>,
    pub steps: Vec<Step>,
}
