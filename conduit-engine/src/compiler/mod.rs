//! Command compiler
//!
//! Turns one pipeline step into the shell text the backend runs for it. Each
//! step kind has its own module; [`CommandCompiler::compile`] dispatches on the
//! kind exhaustively.

mod catalog;
mod checkout;
mod image;
mod task;
mod upgrade;

pub use catalog::TemplateId;

use conduit_core::Activity;
use conduit_core::domain::step::{Step, StepKind};
use conduit_core::env::{ENV_FILE, PRESERVED_ENVS};

use crate::services::CIService;

/// Script an inline task command is written to before it runs
pub const ENTRYPOINT_SCRIPT: &str = ".r_cicd_entrypoint.sh";

/// Compiles steps into backend shell commands
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    upgrader_image: String,
}

impl CommandCompiler {
    pub fn new(upgrader_image: impl Into<String>) -> Self {
        Self {
            upgrader_image: upgrader_image.into(),
        }
    }

    /// Compile `step` of `activity`
    ///
    /// `services` are the services declared before the step; container tasks
    /// link to each of them. Deploy steps compile to an empty command.
    pub fn compile(&self, activity: &Activity, step: &Step, services: &[CIService]) -> String {
        match &step.kind {
            StepKind::SourceCheckout(_) => checkout::compile(activity),
            StepKind::ContainerTask(task) => task::compile(&activity.id, task, services),
            StepKind::ImageBuild(build) => image::compile(build),
            StepKind::ServiceUpgrade(upgrade) => upgrade::service(&self.upgrader_image, upgrade),
            StepKind::StackUpgrade(upgrade) => upgrade::stack(&self.upgrader_image, upgrade),
            StepKind::CatalogUpgrade(upgrade) => catalog::compile(&self.upgrader_image, upgrade),
            StepKind::Deploy(_) => String::new(),
        }
    }
}

/// Line that loads the exported environment into the current shell
pub(crate) fn source_env() -> String {
    format!(". ${{PWD}}/{}\n", ENV_FILE)
}

/// Escape text for an unquoted heredoc body: backslashes first, then `$`
pub fn escape_heredoc(text: &str) -> String {
    text.replace('\\', "\\\\").replace('$', "\\$")
}

/// Like [`escape_heredoc`], but references to exported variables stay live
///
/// `$NAME` followed by a space, a newline or the end of the text, and
/// `${NAME}`, are restored for every name in [`PRESERVED_ENVS`].
pub fn escape_shell(text: &str) -> String {
    let mut escaped = escape_heredoc(text);
    for name in PRESERVED_ENVS {
        escaped = escaped
            .replace(&format!("\\${} ", name), &format!("${} ", name))
            .replace(&format!("\\${}\n", name), &format!("${}\n", name))
            .replace(&format!("\\${{{}}}", name), &format!("${{{}}}", name));

        let tail = format!("\\${}", name);
        if escaped.ends_with(&tail) {
            let cut = escaped.len() - tail.len();
            escaped.replace_range(cut..cut + 1, "");
        }
    }
    escaped
}
