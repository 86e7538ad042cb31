//! Worker node endpoints

use serde::Deserialize;

use crate::HttpBackend;
use crate::error::Result;

/// Name the backend gives its built-in controller node
const CONTROLLER_NODE: &str = "master";

#[derive(Debug, Deserialize)]
struct ComputerSet {
    #[serde(default)]
    computer: Vec<Computer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Computer {
    display_name: String,
    #[serde(default)]
    offline: bool,
}

/// Wraps a shell command in a script that runs it on the named node
fn node_script(node: &str, command: &str) -> String {
    let command = command.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        concat!(
            "def node = jenkins.model.Jenkins.instance.getNode(\"{}\")\n",
            "def channel = node.toComputer().getChannel()\n",
            "println hudson.util.RemotingDiagnostics.executeGroovy(",
            "\"println(['sh', '-c', '''{}'''].execute().text)\", channel)\n"
        ),
        node, command
    )
}

impl HttpBackend {
    /// List the names of the worker nodes currently online
    ///
    /// The controller node never runs stage jobs and is excluded.
    pub async fn active_nodes(&self) -> Result<Vec<String>> {
        let url = self.url(&["computer", "api", "json"])?;
        let response = self.client.get(url).send().await?;

        let set: ComputerSet = self.handle_response(response).await?;
        Ok(online_workers(set))
    }

    /// Execute a shell command on a worker node, returning its output
    pub async fn run_on_node(&self, node: &str, command: &str) -> Result<String> {
        let url = self.url(&["scriptText"])?;
        let script = node_script(node, command);
        tracing::debug!("Running script on node {}", node);

        let response = self
            .client
            .post(url)
            .form(&[("script", script.as_str())])
            .send()
            .await?;
        self.handle_text_response(response).await
    }
}

fn online_workers(set: ComputerSet) -> Vec<String> {
    set.computer
        .into_iter()
        .filter(|computer| !computer.offline && computer.display_name != CONTROLLER_NODE)
        .map(|computer| computer.display_name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_workers_skips_controller_and_offline() {
        let json = r#"{
            "computer": [
                { "displayName": "master", "offline": false },
                { "displayName": "worker-1", "offline": false },
                { "displayName": "worker-2", "offline": true },
                { "displayName": "worker-3" }
            ]
        }"#;

        let set: ComputerSet = serde_json::from_str(json).unwrap();
        assert_eq!(online_workers(set), vec!["worker-1", "worker-3"]);
    }

    #[test]
    fn test_node_script_escapes_quotes() {
        let script = node_script("worker-1", "docker rm -f \"a\"");
        assert!(script.contains("getNode(\"worker-1\")"));
        assert!(script.contains("docker rm -f \\\"a\\\""));
    }
}
