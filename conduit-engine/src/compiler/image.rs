use conduit_core::domain::step::{DockerfileSource, ImageBuild};

use super::source_env;

/// File an inline Dockerfile is materialized to
const INLINE_DOCKERFILE: &str = ".Dockerfile";

pub(super) fn compile(build: &ImageBuild) -> String {
    let mut script = source_env();

    match &build.source {
        DockerfileSource::Workspace { path } => {
            let context = path.as_deref().filter(|p| !p.is_empty()).unwrap_or(".");
            script.push_str(&format!(
                "docker build --tag {} {};",
                build.target_image, context
            ));
        }
        DockerfileSource::Inline { dockerfile } => {
            script.push_str(&format!(
                "echo \"{}\">{};docker build --tag {} -f {} .;",
                dockerfile.replace('"', "\\\""),
                INLINE_DOCKERFILE,
                build.target_image,
                INLINE_DOCKERFILE
            ));
        }
    }

    if build.push {
        if let Some(credentials) = &build.credentials {
            script.push_str(&format!(
                "docker login --username {} --password {} {};",
                credentials.username,
                credentials.password,
                registry_of(&build.target_image)
            ));
        }
        script.push_str(&format!("docker push {};", build.target_image));
    }

    script
}

/// Registry part of an image reference, the text before the first `/`
fn registry_of(image: &str) -> &str {
    image.split_once('/').map(|(registry, _)| registry).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::domain::step::Credentials;

    #[test]
    fn test_workspace_build_defaults_to_current_dir() {
        let build = ImageBuild {
            target_image: "app:1".to_string(),
            ..Default::default()
        };
        assert_eq!(compile(&build), ". ${PWD}/.r_cicd.env\ndocker build --tag app:1 .;");
    }

    #[test]
    fn test_inline_build_escapes_quotes() {
        let build = ImageBuild {
            source: DockerfileSource::Inline {
                dockerfile: "FROM alpine\nLABEL a=\"b\"".to_string(),
            },
            target_image: "app:1".to_string(),
            ..Default::default()
        };
        let compiled = compile(&build);
        assert!(compiled.contains("echo \"FROM alpine\nLABEL a=\\\"b\\\"\">.Dockerfile;"));
        assert!(compiled.ends_with("docker build --tag app:1 -f .Dockerfile .;"));
    }

    #[test]
    fn test_push_logs_into_registry_prefix() {
        let build = ImageBuild {
            source: DockerfileSource::Workspace {
                path: Some("docker/".to_string()),
            },
            target_image: "reg.example.com/team/app:1".to_string(),
            push: true,
            credentials: Some(Credentials {
                username: "bot".to_string(),
                password: "secret".to_string(),
            }),
        };
        let compiled = compile(&build);
        assert!(compiled.contains("docker build --tag reg.example.com/team/app:1 docker/;"));
        assert!(compiled.contains(
            "docker login --username bot --password secret reg.example.com;docker push reg.example.com/team/app:1;"
        ));
    }
}
