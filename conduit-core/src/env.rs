//! Environment exported to pipeline steps
//!
//! The source checkout step writes these variables to [`ENV_FILE`] in the
//! stage workspace; later steps source that file. The list is closed: upgrade
//! scripts rely on it to decide which `$NAME` references stay live.

/// File every step sources before running
pub const ENV_FILE: &str = ".r_cicd.env";

/// Namespace prefix of every exported variable
pub const ENV_PREFIX: &str = "CICD_";

/// Variables captured from the backend checkout environment, unprefixed
pub const CHECKOUT_VARS: [&str; 12] = [
    "GIT_COMMIT",
    "GIT_PREVIOUS_COMMIT",
    "GIT_PREVIOUS_SUCCESSFUL_COMMIT",
    "GIT_BRANCH",
    "GIT_LOCAL_BRANCH",
    "GIT_URL",
    "GIT_COMMITTER_NAME",
    "GIT_AUTHOR_NAME",
    "GIT_COMMITTER_EMAIL",
    "GIT_AUTHOR_EMAIL",
    "SVN_REVISION",
    "SVN_URL",
];

/// Every variable name written to [`ENV_FILE`]
pub const PRESERVED_ENVS: [&str; 18] = [
    "CICD_GIT_COMMIT",
    "CICD_GIT_PREVIOUS_COMMIT",
    "CICD_GIT_PREVIOUS_SUCCESSFUL_COMMIT",
    "CICD_GIT_BRANCH",
    "CICD_GIT_LOCAL_BRANCH",
    "CICD_GIT_URL",
    "CICD_GIT_COMMITTER_NAME",
    "CICD_GIT_AUTHOR_NAME",
    "CICD_GIT_COMMITTER_EMAIL",
    "CICD_GIT_AUTHOR_EMAIL",
    "CICD_SVN_REVISION",
    "CICD_SVN_URL",
    "CICD_PIPELINE_NAME",
    "CICD_PIPELINE_ID",
    "CICD_TRIGGER_TYPE",
    "CICD_NODE_NAME",
    "CICD_ACTIVITY_ID",
    "CICD_ACTIVITY_SEQUENCE",
];
