//! Activity service
//!
//! Entry points for callers outside the engine. Every operation on an
//! existing activity takes its lock, loads it, applies the change and
//! persists it, then queues a sync where the backend will make progress.

use std::sync::Arc;

use conduit_core::{Activity, Pipeline, validate};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::locks::ActivityLocks;
use crate::orchestrator::Orchestrator;
use crate::scheduler::{StepEvent, SyncScheduler, SyncTrigger};
use crate::store::ActivityStore;

/// Changes applied to an existing activity under its lock
#[derive(Debug, Clone, Copy)]
enum Change {
    Rerun,
    Approve,
    Deny,
}

#[derive(Clone)]
pub struct ActivityService {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ActivityStore>,
    locks: ActivityLocks,
    scheduler: SyncScheduler,
}

impl ActivityService {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ActivityStore>,
        locks: ActivityLocks,
        scheduler: SyncScheduler,
    ) -> Self {
        Self {
            orchestrator,
            store,
            locks,
            scheduler,
        }
    }

    /// Validate and store a pipeline definition, assigning an id if it has none
    pub async fn save_pipeline(&self, mut pipeline: Pipeline) -> Result<Pipeline> {
        validate(&pipeline)?;
        if pipeline.id.is_empty() {
            pipeline.id = Uuid::new_v4().to_string();
        }
        self.store.put_pipeline(&pipeline).await?;
        tracing::info!("Pipeline saved: {} ({})", pipeline.name, pipeline.id);
        Ok(pipeline)
    }

    pub async fn get_pipeline(&self, id: &str) -> Result<Pipeline> {
        self.store
            .get_pipeline(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("pipeline {}", id)))
    }

    pub async fn get_activity(&self, id: &str) -> Result<Activity> {
        self.store
            .get_activity(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("activity {}", id)))
    }

    /// Start a run of a stored pipeline
    pub async fn run_pipeline(&self, pipeline_id: &str) -> Result<Activity> {
        let pipeline = self.get_pipeline(pipeline_id).await?;
        if !pipeline.is_active {
            return Err(EngineError::InvalidState(format!(
                "pipeline {} is not active",
                pipeline_id
            )));
        }
        validate(&pipeline)?;

        let activity = self.orchestrator.run_pipeline(&pipeline).await?;
        self.scheduler.enqueue(activity.id.clone(), SyncTrigger::Poll);
        Ok(activity)
    }

    pub async fn rerun(&self, id: &str) -> Result<Activity> {
        self.apply(id, Change::Rerun).await
    }

    pub async fn approve(&self, id: &str) -> Result<Activity> {
        self.apply(id, Change::Approve).await
    }

    pub async fn deny(&self, id: &str) -> Result<Activity> {
        self.apply(id, Change::Deny).await
    }

    /// Delete the builds of the finished stages of an activity
    pub async fn delete_builds(&self, id: &str) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        let activity = self.get_activity(id).await?;
        self.orchestrator.delete_completed_jobs(&activity).await
    }

    /// Record a step callback and queue a sync of its activity
    pub async fn step_event(&self, id: &str, event: StepEvent) -> Result<()> {
        let activity = self.get_activity(id).await?;
        let steps = activity
            .stages
            .get(event.stage)
            .map(|stage| stage.steps.len())
            .unwrap_or_default();
        if event.step >= steps {
            return Err(EngineError::step_index(event.stage, event.step));
        }

        if !self.scheduler.enqueue(id, SyncTrigger::Step(event)) {
            tracing::warn!("Sync queue closed, dropping step event of activity {}", id);
        }
        Ok(())
    }

    pub async fn step_log(&self, id: &str, stage: usize, step: usize) -> Result<String> {
        let activity = self.get_activity(id).await?;
        self.orchestrator.step_log(&activity, stage, step).await
    }

    async fn apply(&self, id: &str, change: Change) -> Result<Activity> {
        let _guard = self.locks.lock(id).await;
        let mut activity = self.get_activity(id).await?;

        match change {
            Change::Rerun => self.orchestrator.rerun_activity(&mut activity).await?,
            Change::Approve => self.orchestrator.approve(&mut activity).await?,
            Change::Deny => self.orchestrator.deny(&mut activity).await?,
        }

        self.store.put_activity(&activity).await?;
        self.orchestrator.record_run(&activity, false).await?;
        if !activity.is_complete() {
            self.scheduler.enqueue(activity.id.clone(), SyncTrigger::Poll);
        }
        Ok(activity)
    }
}
