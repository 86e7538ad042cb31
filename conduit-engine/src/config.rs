//! Engine configuration

use std::time::Duration;

/// Workspace root on the backend; expanded on the worker
pub const DEFAULT_BACKEND_HOME: &str = "${JENKINS_HOME}";

/// Image providing the service/stack/catalog upgrade tool
pub const DEFAULT_UPGRADER_IMAGE: &str = "rancher/rancher-upgrader:latest";

/// Tunables shared by the job spec builder and the sync scheduler
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend home directory; workspaces live under `<home>/workspace/<activityId>`
    pub backend_home: String,

    /// Image used by upgrade steps
    pub upgrader_image: String,

    /// How long an activity's sync worker lingers without triggers before exiting
    pub worker_idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_home: DEFAULT_BACKEND_HOME.to_string(),
            upgrader_image: DEFAULT_UPGRADER_IMAGE.to_string(),
            worker_idle_timeout: Duration::from_secs(60),
        }
    }
}
