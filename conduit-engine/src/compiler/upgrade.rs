use conduit_core::domain::step::{DeployTarget, ServiceUpgrade, StackUpgrade};

use super::source_env;

/// Working directory stack files are written to
const STACK_DIR: &str = ".r_cicd_stack";

/// Endpoint flags of the upgrade tool
///
/// A local target reads the worker's ambient environment at run time.
pub(super) fn target_flags(target: &DeployTarget) -> String {
    match target {
        DeployTarget::Local => {
            " --envurl $CATTLE_URL --accesskey $CATTLE_ACCESS_KEY --secretkey $CATTLE_SECRET_KEY"
                .to_string()
        }
        DeployTarget::Remote {
            endpoint,
            access_key,
            secret_key,
        } => format!(
            " --envurl {} --accesskey {} --secretkey {}",
            endpoint, access_key, secret_key
        ),
    }
}

/// Rolling upgrade of the services matching the selector
pub(super) fn service(upgrader_image: &str, upgrade: &ServiceUpgrade) -> String {
    let mut script = source_env();
    script.push_str(&format!("docker run {} service", upgrader_image));

    if !upgrade.image_tag.is_empty() {
        script.push_str(&format!(" --image {}", upgrade.image_tag));
    }
    if upgrade.batch_size > 0 {
        script.push_str(&format!(" --batchsize {}", upgrade.batch_size));
    }
    if upgrade.interval != 0 {
        script.push_str(&format!(" --interval {}", upgrade.interval));
    }
    if upgrade.start_first {
        script.push_str(" --startfirst true");
    }
    script.push_str(&target_flags(&upgrade.target));
    for (key, value) in &upgrade.selector {
        script.push_str(&format!(" --selector {}={}", key, value));
    }

    script
}

/// Upgrade a stack from its compose files
///
/// The compose bodies go into unquoted heredocs, so `$` references in them
/// expand from the exported environment on the worker.
pub(super) fn stack(upgrader_image: &str, upgrade: &StackUpgrade) -> String {
    let mut script = source_env();
    script.push_str(&format!("mkdir -p {}\n", STACK_DIR));
    script.push_str(&format!(
        "cat>{}/docker-compose.yml<<EOF\n{}\nEOF\n",
        STACK_DIR, upgrade.docker_compose
    ));
    script.push_str(&format!(
        "cat>{}/rancher-compose.yml<<EOF\n{}\nEOF\n",
        STACK_DIR, upgrade.rancher_compose
    ));
    script.push_str(&format!(
        "docker run --rm --volumes-from ${{HOSTNAME}} -w ${{PWD}}/{} {} stack --stackname {}{}",
        STACK_DIR,
        upgrader_image,
        upgrade.stack_name,
        target_flags(&upgrade.target)
    ));
    script.push_str(" --dockercompose docker-compose.yml --ranchercompose rancher-compose.yml");

    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_service_upgrade_flags() {
        let upgrade = ServiceUpgrade {
            image_tag: "app:2".to_string(),
            selector: BTreeMap::from([("app".to_string(), "web".to_string())]),
            batch_size: 2,
            interval: 0,
            start_first: true,
            target: DeployTarget::Remote {
                endpoint: "https://env.example.com".to_string(),
                access_key: "ak".to_string(),
                secret_key: "sk".to_string(),
            },
        };

        assert_eq!(
            service("upgrader:1", &upgrade),
            ". ${PWD}/.r_cicd.env\ndocker run upgrader:1 service --image app:2 --batchsize 2 --startfirst true --envurl https://env.example.com --accesskey ak --secretkey sk --selector app=web"
        );
    }

    #[test]
    fn test_service_upgrade_local_target() {
        let upgrade = ServiceUpgrade {
            interval: 5,
            ..Default::default()
        };

        let script = service("upgrader:1", &upgrade);
        assert!(script.ends_with(
            "service --interval 5 --envurl $CATTLE_URL --accesskey $CATTLE_ACCESS_KEY --secretkey $CATTLE_SECRET_KEY"
        ));
    }

    #[test]
    fn test_stack_upgrade_writes_compose_files() {
        let upgrade = StackUpgrade {
            stack_name: "web".to_string(),
            docker_compose: "services:\n  app:\n    image: app:$CICD_GIT_COMMIT".to_string(),
            rancher_compose: "version: '2'".to_string(),
            target: DeployTarget::Local,
        };

        let script = stack("upgrader:1", &upgrade);
        assert!(script.contains("cat>.r_cicd_stack/docker-compose.yml<<EOF\nservices:\n  app:\n    image: app:$CICD_GIT_COMMIT\nEOF\n"));
        assert!(script.contains("upgrader:1 stack --stackname web --envurl $CATTLE_URL"));
    }
}
