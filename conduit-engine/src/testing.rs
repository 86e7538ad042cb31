//! Test fixtures: a scripted backend and pipeline builders

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use conduit_backend::{BackendError, BuildInfo, JobBackend, JobInfo, JobSpec};
use conduit_core::domain::step::{ContainerTask, SourceCheckout, Step, StepKind, TaskCommand};
use conduit_core::{Pipeline, Stage};

/// Everything the fake backend knows and every call it received
#[derive(Default)]
pub struct FakeState {
    pub nodes: Vec<String>,
    pub fail_nodes: bool,
    /// Job creation fails once this many jobs exist
    pub fail_create_after: Option<usize>,
    pub fail_update: bool,
    pub fail_scripts: bool,
    pub builds: HashMap<String, BuildInfo>,
    pub transcripts: HashMap<String, String>,
    pub jobs: HashMap<String, JobSpec>,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub started: Vec<String>,
    pub deleted: Vec<String>,
    pub scripts: Vec<(String, String)>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: &[&str]) -> Self {
        let backend = Self::new();
        backend.state().nodes = nodes.iter().map(|n| n.to_string()).collect();
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Record a build of `job` that started at `start` and, when `duration` is
    /// non-zero, finished
    pub fn set_build(&self, job: &str, start: i64, duration: i64, transcript: &str) {
        let mut state = self.state();
        state.builds.insert(
            job.to_string(),
            BuildInfo {
                number: 1,
                building: duration == 0,
                start_timestamp: start,
                duration_ms: duration,
                resolved_revision: Some("c0ffee".to_string()),
            },
        );
        state
            .transcripts
            .insert(job.to_string(), transcript.to_string());
    }
}

fn not_found(name: &str) -> BackendError {
    BackendError::query_failed(404, format!("job {} not found", name))
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn active_nodes(&self) -> conduit_backend::Result<Vec<String>> {
        let state = self.state();
        if state.fail_nodes {
            return Err(BackendError::query_failed(503, "unavailable"));
        }
        Ok(state.nodes.clone())
    }

    async fn create_job(&self, name: &str, spec: &JobSpec) -> conduit_backend::Result<()> {
        let mut state = self.state();
        if state.fail_create_after == Some(state.created.len()) {
            return Err(BackendError::query_failed(500, "create failed"));
        }
        state.created.push(name.to_string());
        state.jobs.insert(name.to_string(), spec.clone());
        Ok(())
    }

    async fn update_job(&self, name: &str, spec: &JobSpec) -> conduit_backend::Result<()> {
        let mut state = self.state();
        if state.fail_update {
            return Err(BackendError::query_failed(500, "update failed"));
        }
        state.updated.push(name.to_string());
        state.jobs.insert(name.to_string(), spec.clone());
        Ok(())
    }

    async fn start_job(&self, name: &str) -> conduit_backend::Result<()> {
        let mut state = self.state();
        if !state.jobs.contains_key(name) {
            return Err(not_found(name));
        }
        state.started.push(name.to_string());
        Ok(())
    }

    async fn job_info(&self, name: &str) -> conduit_backend::Result<JobInfo> {
        let state = self.state();
        if !state.jobs.contains_key(name) {
            return Err(not_found(name));
        }
        Ok(JobInfo {
            name: name.to_string(),
            buildable: true,
            in_queue: false,
            last_build_number: state.builds.get(name).map(|b| b.number),
        })
    }

    async fn last_build(&self, name: &str) -> conduit_backend::Result<Option<BuildInfo>> {
        Ok(self.state().builds.get(name).cloned())
    }

    async fn console_text(&self, name: &str) -> conduit_backend::Result<String> {
        self.state()
            .transcripts
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn delete_last_build(&self, name: &str) -> conduit_backend::Result<()> {
        let mut state = self.state();
        state.builds.remove(name);
        state.transcripts.remove(name);
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn run_on_node(&self, node: &str, command: &str) -> conduit_backend::Result<String> {
        let mut state = self.state();
        if state.fail_scripts {
            return Err(BackendError::query_failed(500, "script failed"));
        }
        state.scripts.push((node.to_string(), command.to_string()));
        Ok(String::new())
    }
}

pub fn task_step(name: &str, script: &str) -> Step {
    Step::new(
        name,
        StepKind::ContainerTask(ContainerTask {
            image: "alpine:3".to_string(),
            command: TaskCommand::Script(script.to_string()),
            ..Default::default()
        }),
    )
}

pub fn service_step(name: &str, image: &str, alias: &str) -> Step {
    Step::new(
        name,
        StepKind::ContainerTask(ContainerTask {
            image: image.to_string(),
            alias: Some(alias.to_string()),
            is_service: true,
            ..Default::default()
        }),
    )
}

pub fn approval_stage(name: &str, steps: Vec<Step>) -> Stage {
    Stage {
        name: name.to_string(),
        need_approval: true,
        approvers: vec!["ops".to_string()],
        steps,
    }
}

/// Pipeline "demo" with a checkout stage followed by `stages`
pub fn pipeline_with(stages: Vec<(&str, Vec<Step>)>) -> Pipeline {
    let checkout = Stage {
        name: "checkout".to_string(),
        steps: vec![Step::new(
            "git",
            StepKind::SourceCheckout(SourceCheckout {
                repository: "https://git.example.com/demo.git".to_string(),
                branch: "main".to_string(),
                webhook: false,
            }),
        )],
        ..Default::default()
    };

    let mut all = vec![checkout];
    all.extend(stages.into_iter().map(|(name, steps)| Stage {
        name: name.to_string(),
        steps,
        ..Default::default()
    }));

    Pipeline {
        id: "p1".to_string(),
        name: "demo".to_string(),
        is_active: true,
        stages: all,
        ..Default::default()
    }
}

/// Transcript line prefix for the given elapsed milliseconds
pub fn ts(ms: i64) -> String {
    let secs = ms / 1000;
    format!(
        "{:02}h{:02}m{:02}s{:03}ms",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms % 1000
    )
}

/// Transcript of a stage with one shell step per `(start_ms, end_ms)` entry
///
/// `finished` appends the backend's final status line.
pub fn transcript(steps: &[(i64, i64)], finished: Option<bool>) -> String {
    let mut out = format!("{}  Started by upstream project\n", ts(0));
    let mut last = 0;
    for (i, (start, end)) in steps.iter().enumerate() {
        out.push_str(&format!("{}  [act1] $ /bin/sh -xe /tmp/jenkins{}.sh\n", ts(*start), i));
        out.push_str(&format!("{}  + step {}\n", ts(*start), i));
        out.push_str(&format!("{}  done {}\n", ts(*end), i));
        last = *end;
    }
    match finished {
        Some(true) => out.push_str(&format!("{}  Finished: SUCCESS\n", ts(last))),
        Some(false) => out.push_str(&format!("{}  Finished: FAILURE\n", ts(last))),
        None => {}
    }
    out
}
