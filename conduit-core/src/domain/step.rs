//! Step domain types
//!
//! Every step kind carries only its own fields. The command compiler matches
//! on [`StepKind`] exhaustively, so a field can never be read for a kind it
//! does not belong to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single unit of work within a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The closed set of step kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepKind {
    SourceCheckout(SourceCheckout),
    ContainerTask(ContainerTask),
    ImageBuild(ImageBuild),
    ServiceUpgrade(ServiceUpgrade),
    StackUpgrade(StackUpgrade),
    CatalogUpgrade(CatalogUpgrade),
    Deploy(Deploy),
}

impl StepKind {
    /// Short label used in logs and validation messages
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::SourceCheckout(_) => "sourceCheckout",
            StepKind::ContainerTask(_) => "containerTask",
            StepKind::ImageBuild(_) => "imageBuild",
            StepKind::ServiceUpgrade(_) => "serviceUpgrade",
            StepKind::StackUpgrade(_) => "stackUpgrade",
            StepKind::CatalogUpgrade(_) => "catalogUpgrade",
            StepKind::Deploy(_) => "deploy",
        }
    }
}

/// Repository checkout, performed by the backend from the job's SCM binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCheckout {
    pub repository: String,
    pub branch: String,
    /// Trigger a run on push events
    #[serde(default)]
    pub webhook: bool,
}

/// What a container task executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "camelCase")]
pub enum TaskCommand {
    /// Inline shell text, written to a script and run through `/bin/sh`
    Script(String),
    /// Raw arguments passed to the image entrypoint
    Args(String),
}

impl Default for TaskCommand {
    fn default() -> Self {
        TaskCommand::Args(String::new())
    }
}

/// Runs an image inside the stage workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerTask {
    pub image: String,
    #[serde(default)]
    pub command: TaskCommand,
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Environment variable names forwarded with `-e`
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Link name used by later steps to reach this step when it is a service
    #[serde(default)]
    pub alias: Option<String>,
    /// Started detached so later steps can link to it
    #[serde(default)]
    pub is_service: bool,
}

/// Where the Dockerfile of an image build comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum DockerfileSource {
    /// Build context inside the checked out workspace, optionally a sub-path
    Workspace {
        #[serde(default)]
        path: Option<String>,
    },
    /// Dockerfile body supplied inline
    Inline { dockerfile: String },
}

impl Default for DockerfileSource {
    fn default() -> Self {
        DockerfileSource::Workspace { path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Builds an image, optionally pushing it to its registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBuild {
    #[serde(flatten)]
    pub source: DockerfileSource,
    pub target_image: String,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Which environment an upgrade step acts on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "env", rename_all = "camelCase")]
pub enum DeployTarget {
    /// The environment the worker runs in; credentials come from its ambient variables
    #[default]
    Local,
    /// An explicitly supplied endpoint
    Remote {
        endpoint: String,
        access_key: String,
        secret_key: String,
    },
}

/// Rolling upgrade of the services matching a selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceUpgrade {
    pub image_tag: String,
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub batch_size: u32,
    #[serde(default)]
    pub interval: u32,
    #[serde(default)]
    pub start_first: bool,
    #[serde(default)]
    pub target: DeployTarget,
}

/// Upgrade of a whole stack from compose files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackUpgrade {
    pub stack_name: String,
    #[serde(default)]
    pub docker_compose: String,
    #[serde(default)]
    pub rancher_compose: String,
    #[serde(default)]
    pub target: DeployTarget,
}

/// A named file body attached to a catalog upgrade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainFile {
    pub name: String,
    pub body: String,
}

/// Publishes a new catalog template version and optionally deploys it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogUpgrade {
    /// Git repository of the catalog
    pub repository: String,
    pub branch: String,
    #[serde(default)]
    pub credentials: Credentials,
    /// `catalog:[base*]template[:revision]`
    pub external_id: String,
    #[serde(default)]
    pub files: Vec<PlainFile>,
    #[serde(default)]
    pub answers: String,
    #[serde(default)]
    pub deploy: bool,
    #[serde(default)]
    pub target: DeployTarget,
    #[serde(default)]
    pub stack_name: String,
}

/// Reserved deploy step; compiles to nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
    #[serde(default)]
    pub deploy_name: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub count: u32,
}
