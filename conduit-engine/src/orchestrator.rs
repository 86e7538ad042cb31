//! Orchestrator
//!
//! Drives activities through the backend: provisioning stage jobs, starting
//! stages, reruns, approval decisions and build cleanup. Callers serialize
//! access to a given activity (see [`crate::locks::ActivityLocks`]).

use std::sync::Arc;

use chrono::Utc;
use conduit_backend::JobBackend;
use conduit_core::{Activity, ActivityStage, ActivityStatus, Pipeline, StageStatus};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::job_spec::JobSpecBuilder;
use crate::locks::{ActivityLocks, pipeline_key};
use crate::log_split::step_segment;
use crate::node::node_for_run;
use crate::store::ActivityStore;
use crate::sync::sync_activity;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct Orchestrator {
    backend: Arc<dyn JobBackend>,
    store: Arc<dyn ActivityStore>,
    locks: ActivityLocks,
    builder: JobSpecBuilder,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        store: Arc<dyn ActivityStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            backend,
            store,
            locks: ActivityLocks::new(),
            builder: JobSpecBuilder::new(config),
        }
    }

    /// Share the lock registry used by the other writers of activities
    pub fn with_locks(mut self, locks: ActivityLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn backend(&self) -> &Arc<dyn JobBackend> {
        &self.backend
    }

    /// Start a new activity of `pipeline`
    ///
    /// The activity is persisted before any job exists. Every stage job is
    /// provisioned up front, then the first stage is started; later stages
    /// follow through their upstream triggers or through approval. If
    /// provisioning fails the persisted activity is marked Fail.
    pub async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Activity> {
        if pipeline.stages.is_empty() {
            return Err(EngineError::NoStages);
        }

        let id = Uuid::new_v4().to_string();
        let node = node_for_run(self.backend.as_ref(), &id).await?;
        let activity = Activity::new(id.clone(), pipeline.clone(), node, now_millis());

        let key = pipeline_key(&pipeline.id);
        let run = self.locks.exclusive(&key, self.start_run(activity));
        self.locks.exclusive(&id, run).await
    }

    /// Number, persist and provision a new activity; callers hold its lock
    /// and its pipeline's lock
    async fn start_run(&self, mut activity: Activity) -> Result<Activity> {
        if let Some(stored) = self.store.get_pipeline(&activity.pipeline.id).await? {
            activity.run_sequence = stored.run_count + 1;
        }
        self.store.put_activity(&activity).await?;

        if let Err(e) = self.provision(&activity).await {
            tracing::error!("Failed to provision activity {}: {}", activity.id, e);
            activity.status = ActivityStatus::Fail;
            activity.stop_ts = Some(now_millis());
            self.store.put_activity(&activity).await?;
            return Err(e);
        }

        tracing::info!(
            "Activity {} (#{}) of pipeline {} started on {}",
            activity.id,
            activity.run_sequence,
            activity.pipeline.name,
            activity.node_name
        );
        self.write_run(&activity, true).await?;
        Ok(activity)
    }

    async fn provision(&self, activity: &Activity) -> Result<()> {
        for ordinal in 0..activity.stages.len() {
            let name = activity
                .job_name(ordinal)
                .ok_or_else(|| EngineError::stage_index(ordinal))?;
            let spec = self.builder.build(activity, ordinal)?;
            self.backend.create_job(&name, &spec).await?;
        }
        self.start_stage(activity, 0).await
    }

    /// Run a finished activity again under the same id
    ///
    /// Previous builds are deleted and the node is selected anew. The
    /// checkout stage is pinned to the commit the first run resolved, so
    /// the rerun builds the same source; a failure to re-pin is only logged.
    pub async fn rerun_activity(&self, activity: &mut Activity) -> Result<()> {
        self.delete_completed_jobs(activity).await?;

        let node = node_for_run(self.backend.as_ref(), &activity.id).await?;
        let node_changed = node != activity.node_name;
        activity.node_name = node;

        let commit = activity.commit_info.clone();
        for ordinal in 0..activity.stages.len() {
            let pinned = ordinal == 0 && commit.is_some();
            if !pinned && !node_changed {
                continue;
            }
            if let Err(e) = self.rebind(activity, ordinal, commit.as_deref()).await {
                tracing::warn!(
                    "Failed to rebind stage {} of activity {}: {}",
                    ordinal,
                    activity.id,
                    e
                );
            }
        }

        let key = pipeline_key(&activity.pipeline.id);
        self.locks.exclusive(&key, self.restart(activity)).await
    }

    /// Renumber and reset a rerun activity, then start it; callers hold its
    /// pipeline's lock
    async fn restart(&self, activity: &mut Activity) -> Result<()> {
        activity.run_sequence = match self.store.get_pipeline(&activity.pipeline.id).await? {
            Some(pipeline) => pipeline.run_count + 1,
            None => activity.run_sequence + 1,
        };
        activity.start_ts = now_millis();
        activity.stop_ts = None;
        activity.status = ActivityStatus::Waiting;
        activity.pending_stage = None;
        for (stage, definition) in activity.stages.iter_mut().zip(&activity.pipeline.stages) {
            *stage = ActivityStage::from(definition);
        }

        self.start_stage(activity, 0).await?;
        tracing::info!("Activity {} rerun as #{}", activity.id, activity.run_sequence);
        self.write_run(activity, true).await
    }

    async fn rebind(&self, activity: &Activity, ordinal: usize, commit: Option<&str>) -> Result<()> {
        let name = activity
            .job_name(ordinal)
            .ok_or_else(|| EngineError::stage_index(ordinal))?;
        let spec = match commit {
            Some(commit) if ordinal == 0 => self.builder.build_pinned(activity, ordinal, commit)?,
            _ => self.builder.build(activity, ordinal)?,
        };
        self.backend.update_job(&name, &spec).await?;
        Ok(())
    }

    /// Trigger the stage job at `ordinal`
    pub async fn start_stage(&self, activity: &Activity, ordinal: usize) -> Result<()> {
        let name = activity
            .job_name(ordinal)
            .ok_or_else(|| EngineError::stage_index(ordinal))?;
        self.backend.start_job(&name).await?;
        tracing::debug!("Started job {}", name);
        Ok(())
    }

    /// Delete the most recent build of every finished stage
    ///
    /// Refused while the activity is Waiting or Building.
    pub async fn delete_completed_jobs(&self, activity: &Activity) -> Result<()> {
        if activity.status.is_running() {
            return Err(EngineError::ActivityStillRunning(activity.id.clone()));
        }

        for (ordinal, stage) in activity.stages.iter().enumerate() {
            if !matches!(stage.status, StageStatus::Success | StageStatus::Fail) {
                continue;
            }
            let name = activity
                .job_name(ordinal)
                .ok_or_else(|| EngineError::stage_index(ordinal))?;
            self.backend.delete_last_build(&name).await?;
            tracing::debug!("Deleted last build of {}", name);
        }
        Ok(())
    }

    /// Approve the stage an activity is waiting on and start it
    pub async fn approve(&self, activity: &mut Activity) -> Result<()> {
        let ordinal = pending_stage(activity)?;
        self.start_stage(activity, ordinal).await?;

        activity.stages[ordinal].status = StageStatus::Waiting;
        activity.status = ActivityStatus::Building;
        activity.pending_stage = None;
        tracing::info!("Stage {} of activity {} approved", ordinal, activity.id);
        Ok(())
    }

    /// Deny the stage an activity is waiting on, ending the activity
    pub async fn deny(&self, activity: &mut Activity) -> Result<()> {
        let ordinal = pending_stage(activity)?;

        activity.stages[ordinal].status = StageStatus::Denied;
        activity.status = ActivityStatus::Denied;
        activity.stop_ts = Some(now_millis());
        activity.pending_stage = None;
        tracing::info!("Stage {} of activity {} denied", ordinal, activity.id);
        Ok(())
    }

    /// Transcript of one step, empty if it has not run yet
    pub async fn step_log(&self, activity: &Activity, stage: usize, step: usize) -> Result<String> {
        let steps = activity
            .stages
            .get(stage)
            .map(|s| s.steps.len())
            .ok_or_else(|| EngineError::step_index(stage, step))?;
        if step >= steps {
            return Err(EngineError::step_index(stage, step));
        }
        let name = activity
            .job_name(stage)
            .ok_or_else(|| EngineError::step_index(stage, step))?;

        match self.backend.console_text(&name).await {
            Ok(raw) => Ok(step_segment(&raw, stage, step).to_string()),
            Err(e) if e.is_not_found() => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Bring `activity` up to date with the backend
    pub async fn sync(&self, activity: &mut Activity) -> Result<bool> {
        sync_activity(self.backend.as_ref(), activity).await
    }

    /// Reflect `activity` in the last-run fields of its stored pipeline
    ///
    /// A `new_run` also counts the run. Pipelines that are not stored, or
    /// whose last run is a different activity, are left alone.
    pub async fn record_run(&self, activity: &Activity, new_run: bool) -> Result<()> {
        let key = pipeline_key(&activity.pipeline.id);
        self.locks
            .exclusive(&key, self.write_run(activity, new_run))
            .await
    }

    /// Load-modify-store of the pipeline record; callers hold its lock
    async fn write_run(&self, activity: &Activity, new_run: bool) -> Result<()> {
        let Some(mut pipeline) = self.store.get_pipeline(&activity.pipeline.id).await? else {
            return Ok(());
        };

        if new_run {
            pipeline.run_count = activity.run_sequence;
            pipeline.last_run_id = Some(activity.id.clone());
            pipeline.last_run_time = Some(Utc::now());
        } else if pipeline.last_run_id.as_deref() != Some(activity.id.as_str()) {
            return Ok(());
        }
        pipeline.last_run_status = Some(activity.status);
        self.store.put_pipeline(&pipeline).await
    }
}

fn pending_stage(activity: &Activity) -> Result<usize> {
    if activity.status != ActivityStatus::Pending {
        return Err(EngineError::InvalidState(format!(
            "activity {} is not waiting on approval (current: {})",
            activity.id, activity.status
        )));
    }
    activity
        .pending_stage
        .filter(|ordinal| *ordinal < activity.stages.len())
        .ok_or_else(|| {
            EngineError::InvalidState(format!("activity {} has no pending stage", activity.id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FakeBackend, approval_stage, pipeline_with, task_step, transcript};
    use conduit_core::StepStatus;

    struct Harness {
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
        locks: ActivityLocks,
        orchestrator: Orchestrator,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::with_nodes(&["n1", "n2", "n3"]));
        let store = Arc::new(MemoryStore::new());
        let locks = ActivityLocks::new();
        let orchestrator = Orchestrator::new(backend.clone(), store.clone(), &EngineConfig::default())
            .with_locks(locks.clone());
        Harness {
            backend,
            store,
            locks,
            orchestrator,
        }
    }

    fn gated_pipeline() -> Pipeline {
        let mut pipeline = pipeline_with(vec![("test", vec![task_step("unit", "make test")])]);
        pipeline
            .stages
            .push(approval_stage("deploy", vec![task_step("ship", "make ship")]));
        pipeline
    }

    #[tokio::test]
    async fn test_run_pipeline_provisions_every_stage() {
        let h = harness();
        let pipeline = gated_pipeline();
        h.store.put_pipeline(&pipeline).await.unwrap();

        let activity = h.orchestrator.run_pipeline(&pipeline).await.unwrap();

        let state = h.backend.state();
        assert_eq!(state.created.len(), 3);
        assert_eq!(state.created[0], format!("demo_checkout_{}", activity.id));
        assert_eq!(state.started, vec![format!("demo_checkout_{}", activity.id)]);
        let expected = select_node_for(&activity.id);
        assert_eq!(activity.node_name, expected);
        assert!(state.jobs.values().all(|spec| spec.assigned_node == expected));
        drop(state);

        let stored = h.store.get_activity(&activity.id).await.unwrap().unwrap();
        assert_eq!(stored.stages.len(), 3);
        let pipeline = h.store.get_pipeline("p1").await.unwrap().unwrap();
        assert_eq!(pipeline.run_count, 1);
        assert_eq!(pipeline.last_run_id.as_deref(), Some(activity.id.as_str()));
        assert_eq!(pipeline.last_run_status, Some(ActivityStatus::Waiting));
    }

    #[tokio::test]
    async fn test_run_waits_for_pipeline_record() {
        let h = harness();
        let pipeline = gated_pipeline();
        h.store.put_pipeline(&pipeline).await.unwrap();

        let guard = h.locks.lock(&pipeline_key("p1")).await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            h.orchestrator.run_pipeline(&pipeline),
        )
        .await;
        assert!(blocked.is_err());
        assert!(h.store.list_active_activities().await.unwrap().is_empty());
        assert!(h.backend.state().created.is_empty());
        drop(guard);

        let activity = h.orchestrator.run_pipeline(&pipeline).await.unwrap();
        assert_eq!(activity.run_sequence, 1);
    }

    #[tokio::test]
    async fn test_run_numbers_from_stored_pipeline() {
        let h = harness();
        let stale = gated_pipeline();
        h.store.put_pipeline(&stale).await.unwrap();

        let first = h.orchestrator.run_pipeline(&stale).await.unwrap();
        let second = h.orchestrator.run_pipeline(&stale).await.unwrap();

        assert_eq!(first.run_sequence, 1);
        assert_eq!(second.run_sequence, 2);
        let stored = h.store.get_pipeline("p1").await.unwrap().unwrap();
        assert_eq!(stored.run_count, 2);
        assert_eq!(stored.last_run_id.as_deref(), Some(second.id.as_str()));
        assert!(h.locks.is_empty());
    }

    fn select_node_for(id: &str) -> String {
        let nodes: Vec<String> = ["n1", "n2", "n3"].iter().map(|n| n.to_string()).collect();
        crate::node::select_node(id, &nodes).unwrap()
    }

    #[tokio::test]
    async fn test_run_pipeline_without_stages() {
        let h = harness();
        let mut pipeline = pipeline_with(vec![]);
        pipeline.stages.clear();

        let result = h.orchestrator.run_pipeline(&pipeline).await;
        assert!(matches!(result, Err(EngineError::NoStages)));
        assert!(h.backend.state().created.is_empty());
    }

    #[tokio::test]
    async fn test_run_pipeline_without_nodes() {
        let h = harness();
        h.backend.state().nodes.clear();

        let result = h.orchestrator.run_pipeline(&gated_pipeline()).await;
        assert!(matches!(result, Err(EngineError::NoAvailableNode)));
        assert!(h.store.list_active_activities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_provisioning_fails_activity() {
        let h = harness();
        h.backend.state().fail_create_after = Some(1);

        let result = h.orchestrator.run_pipeline(&gated_pipeline()).await;
        assert!(matches!(result, Err(EngineError::BackendQueryFailed(_))));
        assert!(h.backend.state().started.is_empty());
        assert!(h.store.list_active_activities().await.unwrap().is_empty());
    }

    async fn pending_activity(h: &Harness) -> Activity {
        let mut activity = h.orchestrator.run_pipeline(&gated_pipeline()).await.unwrap();
        let checkout = activity.job_name(0).unwrap();
        let test = activity.job_name(1).unwrap();
        h.backend.set_build(&checkout, 1000, 500, &transcript(&[(0, 500)], Some(true)));
        h.backend.set_build(&test, 2000, 1000, &transcript(&[(0, 1000)], Some(true)));

        assert!(h.orchestrator.sync(&mut activity).await.unwrap());
        assert_eq!(activity.status, ActivityStatus::Pending);
        activity
    }

    #[tokio::test]
    async fn test_approve_starts_pending_stage() {
        let h = harness();
        let mut activity = pending_activity(&h).await;

        h.orchestrator.approve(&mut activity).await.unwrap();

        assert_eq!(activity.status, ActivityStatus::Building);
        assert_eq!(activity.stages[2].status, StageStatus::Waiting);
        assert_eq!(activity.pending_stage, None);
        let started = h.backend.state().started.clone();
        assert_eq!(started.last(), activity.job_name(2).as_ref());

        let again = h.orchestrator.approve(&mut activity).await;
        assert!(matches!(again, Err(EngineError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_deny_ends_activity() {
        let h = harness();
        let mut activity = pending_activity(&h).await;

        h.orchestrator.deny(&mut activity).await.unwrap();

        assert_eq!(activity.status, ActivityStatus::Denied);
        assert_eq!(activity.stages[2].status, StageStatus::Denied);
        assert!(activity.stop_ts.is_some());
        assert!(!h.orchestrator.sync(&mut activity).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_completed_jobs_refuses_running() {
        let h = harness();
        let mut activity = h.orchestrator.run_pipeline(&gated_pipeline()).await.unwrap();
        activity.status = ActivityStatus::Building;

        let result = h.orchestrator.delete_completed_jobs(&activity).await;
        assert!(matches!(result, Err(EngineError::ActivityStillRunning(id)) if id == activity.id));
        assert!(h.backend.state().deleted.is_empty());
    }

    #[tokio::test]
    async fn test_delete_completed_jobs_only_finished_stages() {
        let h = harness();
        let activity = pending_activity(&h).await;

        h.orchestrator.delete_completed_jobs(&activity).await.unwrap();

        let deleted = h.backend.state().deleted.clone();
        assert_eq!(deleted, vec![activity.job_name(0).unwrap(), activity.job_name(1).unwrap()]);
    }

    #[tokio::test]
    async fn test_rerun_pins_commit_and_restarts() {
        let h = harness();
        let pipeline = gated_pipeline();
        h.store.put_pipeline(&pipeline).await.unwrap();
        let mut activity = pending_activity(&h).await;
        h.orchestrator.deny(&mut activity).await.unwrap();
        let first_sequence = activity.run_sequence;

        h.orchestrator.rerun_activity(&mut activity).await.unwrap();

        let state = h.backend.state();
        let checkout = activity.job_name(0).unwrap();
        assert_eq!(state.updated, vec![checkout.clone()]);
        assert_eq!(state.jobs[&checkout].scm.as_ref().unwrap().branch, "c0ffee");
        assert_eq!(state.started.last(), Some(&checkout));
        assert!(state.builds.is_empty());
        drop(state);

        assert_eq!(activity.run_sequence, first_sequence + 1);
        assert_eq!(activity.status, ActivityStatus::Waiting);
        assert_eq!(activity.stop_ts, None);
        assert!(activity.stages.iter().all(|s| s.status == StageStatus::Waiting));
        assert!(activity.stages[1].steps.iter().all(|s| s.status == StepStatus::Waiting));
        assert_eq!(activity.commit_info.as_deref(), Some("c0ffee"));
    }

    #[tokio::test]
    async fn test_rerun_survives_rebind_failure() {
        let h = harness();
        let mut activity = pending_activity(&h).await;
        h.orchestrator.deny(&mut activity).await.unwrap();
        h.backend.state().fail_update = true;

        h.orchestrator.rerun_activity(&mut activity).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::Waiting);
    }

    #[tokio::test]
    async fn test_step_log_segments() {
        let h = harness();
        let activity = pending_activity(&h).await;

        let log = h.orchestrator.step_log(&activity, 1, 0).await.unwrap();
        assert!(log.contains("done 0"));

        let missing = h.orchestrator.step_log(&activity, 1, 5).await;
        assert!(matches!(
            missing,
            Err(EngineError::InvalidStepIndex { stage: 1, step: Some(5) })
        ));

        let not_started = h.orchestrator.step_log(&activity, 2, 0).await.unwrap();
        assert_eq!(not_started, "");
    }
}
