use conduit_core::domain::step::{ContainerTask, TaskCommand};
use conduit_core::env::ENV_FILE;

use super::{ENTRYPOINT_SCRIPT, escape_heredoc, source_env};
use crate::services::{CIService, container_name};

/// Run an image inside the shared workspace
///
/// Script mode writes the escaped script to [`ENTRYPOINT_SCRIPT`] and runs it
/// through `/bin/sh`; args mode sources the environment file and passes the
/// raw arguments to the image. An explicit entrypoint wins over both.
pub(super) fn compile(activity_id: &str, task: &ContainerTask, services: &[CIService]) -> String {
    let mut script = String::new();
    let mut entrypoint = String::new();
    let args = match &task.command {
        TaskCommand::Script(body) => {
            script.push_str(&format!(
                "cat>{}<<EOF\n{}\nEOF\nset -xe\n",
                ENTRYPOINT_SCRIPT,
                escape_heredoc(body)
            ));
            entrypoint = "--entrypoint /bin/sh".to_string();
            ENTRYPOINT_SCRIPT.to_string()
        }
        TaskCommand::Args(args) => {
            script.push_str(&source_env());
            args.clone()
        }
    };

    if let Some(custom) = task.entrypoint.as_deref().filter(|e| !e.is_empty()) {
        entrypoint = format!("--entrypoint {}", custom);
    }

    let env_vars: String = task
        .parameters
        .iter()
        .map(|param| format!("-e {} ", param))
        .collect();

    let detach = if task.is_service {
        let alias = task.alias.as_deref().unwrap_or_default();
        format!("-d --name {}", container_name(activity_id, alias))
    } else {
        String::new()
    };

    let links: String = services
        .iter()
        .map(|service| format!("--link {}:{} ", service.container_name, service.name))
        .collect();

    let parts = [
        "docker run --rm".to_string(),
        format!("--env-file ${{PWD}}/{}", ENV_FILE),
        env_vars.trim_end().to_string(),
        detach,
        "--volumes-from ${HOSTNAME} -w ${PWD}".to_string(),
        entrypoint,
        links.trim_end().to_string(),
        task.image.clone(),
        args,
    ];
    let command = parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    script.push_str(&command);
    script
}
