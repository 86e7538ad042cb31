//! Activity sync
//!
//! Reconciles an activity with what the backend reports for its stage jobs.
//! Stages are walked in order; the walk stops at the first stage that has not
//! started or that failed.

use conduit_backend::JobBackend;
use conduit_core::{Activity, ActivityStatus, StageStatus};

use crate::error::Result;
use crate::log_split::parse_steps;

/// Bring `activity` up to date with the backend
///
/// Returns whether any stage, step or activity status changed. Backend query
/// failures abort the sync and leave the caller's persisted copy untouched.
pub async fn sync_activity(backend: &dyn JobBackend, activity: &mut Activity) -> Result<bool> {
    if activity.status == ActivityStatus::Denied {
        return Ok(false);
    }

    let mut updated = false;
    let stage_count = activity.stages.len();

    for i in 0..stage_count {
        let before = activity.stages[i].status;
        if before == StageStatus::Success {
            continue;
        }
        let Some(job) = activity.job_name(i) else {
            break;
        };

        backend.job_info(&job).await?;
        let Some(build) = backend.last_build(&job).await? else {
            if before == StageStatus::Pending {
                return Ok(updated);
            }
            activity.stages[i].status = StageStatus::Waiting;
            updated |= before != StageStatus::Waiting;
            break;
        };

        if activity.commit_info.is_none() {
            activity.commit_info = build.resolved_revision.clone();
            updated |= activity.commit_info.is_some();
        }

        let status_before = activity.status;
        activity.status = ActivityStatus::Building;
        activity.stages[i].status = StageStatus::Building;
        activity.stages[i].start_ts = build.start_timestamp;

        let raw = backend.console_text(&job).await?;
        let steps_changed = parse_steps(&mut activity.stages[i], &raw);

        let stage_status = activity.stages[i].status;
        match stage_status {
            StageStatus::Fail => {
                activity.status = ActivityStatus::Fail;
                activity.stop_ts = Some(build.start_timestamp + build.duration_ms);
                tracing::info!("Activity {} failed at stage {}", activity.id, activity.stages[i].name);
            }
            StageStatus::Success if i + 1 == stage_count => {
                activity.status = ActivityStatus::Success;
                activity.stop_ts = Some(build.start_timestamp + build.duration_ms);
                tracing::info!("Activity {} succeeded", activity.id);
            }
            StageStatus::Success if activity.stages[i + 1].need_approval => {
                activity.status = ActivityStatus::Pending;
                activity.stages[i + 1].status = StageStatus::Pending;
                activity.pending_stage = Some(i + 1);
                tracing::info!(
                    "Activity {} waiting on approval of stage {}",
                    activity.id,
                    activity.stages[i + 1].name
                );
            }
            _ => {}
        }

        updated |= steps_changed || before != stage_status || status_before != activity.status;

        if stage_status == StageStatus::Fail {
            break;
        }
    }

    Ok(updated)
}
