use conduit_core::Activity;
use conduit_core::env::{CHECKOUT_VARS, ENV_FILE, ENV_PREFIX};

/// Export the checkout and run metadata to the environment file
///
/// The branch is reduced to its last path segment first (`origin/main` to
/// `main`). The trigger type is written empty.
pub(super) fn compile(activity: &Activity) -> String {
    let mut script = String::from("GIT_BRANCH=$(echo $GIT_BRANCH|cut -d / -f 2)\n");
    script.push_str(&format!("cat>{}<<EOF\n", ENV_FILE));

    for var in CHECKOUT_VARS {
        script.push_str(&format!("{}{}=${}\n", ENV_PREFIX, var, var));
    }
    script.push_str(&format!("{}PIPELINE_NAME={}\n", ENV_PREFIX, activity.pipeline.name));
    script.push_str(&format!("{}PIPELINE_ID={}\n", ENV_PREFIX, activity.pipeline.id));
    script.push_str(&format!("{}TRIGGER_TYPE=\n", ENV_PREFIX));
    script.push_str(&format!("{}NODE_NAME={}\n", ENV_PREFIX, activity.node_name));
    script.push_str(&format!("{}ACTIVITY_ID={}\n", ENV_PREFIX, activity.id));
    script.push_str(&format!("{}ACTIVITY_SEQUENCE={}\n", ENV_PREFIX, activity.run_sequence));
    script.push_str("\nEOF\n");

    script
}
