//! Sync scheduler
//!
//! Sync requests (periodic polls and step callbacks) go through one queue.
//! A dispatcher hands them to a worker per activity, so syncs of one activity
//! run one at a time while different activities proceed in parallel. A worker
//! that sees no request for the idle timeout closes its queue, drains what is
//! left, exits and retires the activity's lock entry.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::{Activity, StepStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::completion::CompletionHandler;
use crate::error::{EngineError, Result};
use crate::locks::ActivityLocks;
use crate::orchestrator::Orchestrator;
use crate::store::ActivityStore;

/// Outcome reported by a step callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Started,
    Succeeded,
    Failed,
}

/// Step callback payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub stage: usize,
    pub step: usize,
    pub outcome: StepOutcome,
}

/// Why a sync was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTrigger {
    Poll,
    Step(StepEvent),
}

/// What sync workers need
pub struct SyncContext {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn ActivityStore>,
    pub locks: ActivityLocks,
    pub completion: Arc<CompletionHandler>,
    pub idle_timeout: Duration,
}

impl SyncContext {
    /// Returns whether the activity is finished (terminal or gone)
    async fn process(&self, id: &str, trigger: SyncTrigger) -> bool {
        match self.sync_once(id, &trigger).await {
            Ok(finished) => finished,
            Err(EngineError::NotFound(_)) => {
                warn!("Activity {} no longer exists, dropping {:?}", id, trigger);
                true
            }
            Err(e) => {
                warn!("Sync of activity {} ({:?}) failed: {}", id, trigger, e);
                false
            }
        }
    }

    async fn sync_once(&self, id: &str, trigger: &SyncTrigger) -> Result<bool> {
        let _guard = self.locks.lock(id).await;

        let mut activity = self
            .store
            .get_activity(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("activity {}", id)))?;
        if activity.is_complete() {
            debug!("Activity {} already {}, nothing to sync", id, activity.status);
            return Ok(true);
        }
        let mut changed = false;
        if let SyncTrigger::Step(event) = trigger {
            debug!(
                "Step {}/{} of activity {} reported {:?}",
                event.stage, event.step, id, event.outcome
            );
            changed = apply_step_event(&mut activity, event);
        }

        changed |= self.orchestrator.sync(&mut activity).await?;
        if !changed {
            return Ok(false);
        }
        self.store.put_activity(&activity).await?;
        self.orchestrator.record_run(&activity, false).await?;

        if activity.is_complete() {
            self.completion.on_activity_complete(&activity).await;
        }
        Ok(activity.is_complete())
    }
}

/// Mark the reported step, never moving it back from a terminal status
fn apply_step_event(activity: &mut Activity, event: &StepEvent) -> bool {
    let Some(step) = activity
        .stages
        .get_mut(event.stage)
        .and_then(|stage| stage.steps.get_mut(event.step))
    else {
        return false;
    };
    if step.status.is_terminal() {
        return false;
    }

    let status = match event.outcome {
        StepOutcome::Started => StepStatus::Building,
        StepOutcome::Succeeded => StepStatus::Success,
        StepOutcome::Failed => StepStatus::Fail,
    };
    let changed = step.status != status;
    step.status = status;
    changed
}

/// Handle to the sync queue
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    tx: UnboundedSender<(String, SyncTrigger)>,
}

impl SyncScheduler {
    /// Spawn the dispatcher
    ///
    /// It runs until every handle is dropped.
    pub fn start(context: SyncContext) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch(Arc::new(context), rx));
        (Self { tx }, handle)
    }

    /// Queue a sync of activity `id`; false once the dispatcher is gone
    pub fn enqueue(&self, id: impl Into<String>, trigger: SyncTrigger) -> bool {
        self.tx.send((id.into(), trigger)).is_ok()
    }

    /// Poll every unfinished activity each `interval`
    pub fn spawn_ticker(&self, store: Arc<dyn ActivityStore>, interval: Duration) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                let activities = match store.list_active_activities().await {
                    Ok(activities) => activities,
                    Err(e) => {
                        warn!("Failed to list active activities: {}", e);
                        continue;
                    }
                };
                debug!("Polling {} active activit(ies)", activities.len());

                for Activity { id, .. } in activities {
                    if !scheduler.enqueue(id, SyncTrigger::Poll) {
                        info!("Sync queue closed, stopping ticker");
                        return;
                    }
                }
            }
        })
    }
}

async fn dispatch(context: Arc<SyncContext>, mut rx: UnboundedReceiver<(String, SyncTrigger)>) {
    let mut workers: HashMap<String, UnboundedSender<SyncTrigger>> = HashMap::new();

    while let Some((id, trigger)) = rx.recv().await {
        // An idle worker may have closed its queue since the last request
        let trigger = match workers.get(&id) {
            Some(worker) => match worker.send(trigger) {
                Ok(()) => continue,
                Err(mpsc::error::SendError(trigger)) => trigger,
            },
            None => trigger,
        };

        workers.retain(|_, worker| !worker.is_closed());

        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        if worker_tx.send(trigger).is_ok() {
            tokio::spawn(run_worker(context.clone(), id.clone(), worker_rx));
            workers.insert(id, worker_tx);
        }
    }
    debug!("Sync dispatcher stopped");
}

async fn run_worker(context: Arc<SyncContext>, id: String, mut rx: UnboundedReceiver<SyncTrigger>) {
    debug!("Sync worker for activity {} started", id);
    let mut finished = false;

    loop {
        match time::timeout(context.idle_timeout, rx.recv()).await {
            Ok(Some(trigger)) => finished = context.process(&id, trigger).await,
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Ok(trigger) = rx.try_recv() {
                    finished = context.process(&id, trigger).await;
                }
                break;
            }
        }
    }

    // Unfinished activities keep their lock entry until a later worker sees them end
    if finished {
        context.locks.retire(&id);
    }
    debug!("Sync worker for activity {} exited", id);
}
