//! Activity completion
//!
//! Runs once when an activity reaches Success or Fail: service containers are
//! removed from the worker node and, when enabled, a notification goes out.
//! Failures are logged; they never affect the activity's status.

use std::sync::Arc;

use conduit_backend::JobBackend;
use conduit_core::{Activity, ActivityStatus};

use crate::notify::{Notification, Notifier};
use crate::services::all_services;

pub struct CompletionHandler {
    backend: Arc<dyn JobBackend>,
    notifier: Arc<dyn Notifier>,
}

impl CompletionHandler {
    pub fn new(backend: Arc<dyn JobBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self { backend, notifier }
    }

    pub async fn on_activity_complete(&self, activity: &Activity) {
        if !matches!(activity.status, ActivityStatus::Success | ActivityStatus::Fail) {
            tracing::debug!("Activity {} is {}, skipping completion", activity.id, activity.status);
            return;
        }
        tracing::info!("Activity {} completed with {}", activity.id, activity.status);

        self.remove_services(activity).await;

        if activity.pipeline.notification.enabled {
            let notification = Notification::from_activity(activity);
            if let Err(e) = self.notifier.notify(&notification).await {
                tracing::warn!("Failed to notify about activity {}: {}", activity.id, e);
            }
        }
    }

    async fn remove_services(&self, activity: &Activity) {
        let containers: Vec<String> = all_services(activity)
            .into_iter()
            .map(|service| service.container_name)
            .collect();
        if containers.is_empty() {
            return;
        }

        let command = format!("docker rm -f {}", containers.join(" "));
        match self.backend.run_on_node(&activity.node_name, &command).await {
            Ok(_) => tracing::info!(
                "Removed {} service container(s) of activity {} on {}",
                containers.len(),
                activity.id,
                activity.node_name
            ),
            Err(e) => tracing::warn!(
                "Failed to remove service containers of activity {}: {}",
                activity.id,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::testing::{FakeBackend, pipeline_with, service_step, task_step};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn finished_activity(status: ActivityStatus) -> Activity {
        let mut pipeline = pipeline_with(vec![(
            "test",
            vec![
                service_step("db", "mysql:8", "db"),
                service_step("cache", "redis", "cache"),
                task_step("unit", "make test"),
            ],
        )]);
        pipeline.notification.enabled = true;
        let mut activity = Activity::new("act1".to_string(), pipeline, "n2".to_string(), 0);
        activity.status = status;
        activity
    }

    #[tokio::test]
    async fn test_removes_services_in_one_command() {
        let backend = Arc::new(FakeBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CompletionHandler::new(backend.clone(), notifier.clone());

        handler.on_activity_complete(&finished_activity(ActivityStatus::Success)).await;

        let scripts = backend.state().scripts.clone();
        assert_eq!(scripts, vec![("n2".to_string(), "docker rm -f act1db act1cache".to_string())]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_still_notifies() {
        let backend = Arc::new(FakeBackend::new());
        backend.state().fail_scripts = true;
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CompletionHandler::new(backend.clone(), notifier.clone());

        handler.on_activity_complete(&finished_activity(ActivityStatus::Fail)).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "demo - Execution #1 - Fail!");
    }

    #[tokio::test]
    async fn test_notification_disabled_or_failing() {
        let backend = Arc::new(FakeBackend::new());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let handler = CompletionHandler::new(backend.clone(), notifier.clone());

        let mut activity = finished_activity(ActivityStatus::Success);
        handler.on_activity_complete(&activity).await;
        assert_eq!(backend.state().scripts.len(), 1);

        activity.pipeline.notification.enabled = false;
        let quiet = Arc::new(RecordingNotifier::default());
        let handler = CompletionHandler::new(backend.clone(), quiet.clone());
        handler.on_activity_complete(&activity).await;
        assert!(quiet.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_activity_is_ignored() {
        let backend = Arc::new(FakeBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CompletionHandler::new(backend.clone(), notifier.clone());

        handler.on_activity_complete(&finished_activity(ActivityStatus::Denied)).await;

        assert!(backend.state().scripts.is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
