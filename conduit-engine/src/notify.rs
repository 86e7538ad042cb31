//! Completion notifications

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::{Activity, ActivityStatus, StageStatus};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Per-stage line of a notification
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub name: String,
    pub status: StageStatus,
    pub start_ts: i64,
    pub duration: i64,
}

/// Summary of a finished activity
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub pipeline_name: String,
    pub run_sequence: u32,
    pub status: ActivityStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Wall time from start to stop, in seconds
    pub execution_secs: i64,
    pub stages: Vec<StageSummary>,
}

impl Notification {
    pub fn from_activity(activity: &Activity) -> Self {
        let stop = activity.stop_ts.unwrap_or(activity.start_ts);
        Self {
            recipients: activity.pipeline.notification.recipients.clone(),
            subject: format!(
                "{} - Execution #{} - {}!",
                activity.pipeline.name, activity.run_sequence, activity.status
            ),
            pipeline_name: activity.pipeline.name.clone(),
            run_sequence: activity.run_sequence,
            status: activity.status,
            started_at: DateTime::from_timestamp_millis(activity.start_ts),
            execution_secs: (stop - activity.start_ts).max(0) / 1000,
            stages: activity
                .stages
                .iter()
                .map(|stage| StageSummary {
                    name: stage.name.clone(),
                    status: stage.status,
                    start_ts: stage.start_ts,
                    duration: stage.duration,
                })
                .collect(),
        }
    }

    /// Plain-text body
    pub fn body(&self) -> String {
        let started = self
            .started_at
            .map(|t| t.format("%Y-%m-%d %I:%M:%S %p").to_string())
            .unwrap_or_default();

        let mut body = format!(
            "Start time: {}\nExecution time: {}s\nStatus:\n",
            started, self.execution_secs
        );
        for stage in &self.stages {
            let stage_start = DateTime::from_timestamp_millis(stage.start_ts)
                .filter(|_| stage.start_ts > 0)
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            body.push_str(&format!(
                "{}: {} (started {}, {}s)\n",
                stage.name,
                stage.status,
                stage_start,
                stage.duration / 1000
            ));
        }
        body
    }
}

/// Delivers notifications to people
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            "Notification to {:?}: {}\n{}",
            notification.recipients,
            notification.subject,
            notification.body()
        );
        Ok(())
    }
}
