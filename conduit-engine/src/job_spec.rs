//! Job spec builder
//!
//! Produces the backend job specification of one stage of an activity.

use conduit_backend::{JobSpec, ScmBinding, UpstreamTrigger};
use conduit_core::Activity;
use conduit_core::domain::step::StepKind;

use crate::compiler::CommandCompiler;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::services::services_for;

#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    compiler: CommandCompiler,
    backend_home: String,
}

impl JobSpecBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            compiler: CommandCompiler::new(config.upgrader_image.clone()),
            backend_home: config.backend_home.clone(),
        }
    }

    /// Workspace shared by every stage job of an activity
    pub fn workspace(&self, activity_id: &str) -> String {
        format!(
            "{}/workspace/{}",
            self.backend_home.trim_end_matches('/'),
            activity_id
        )
    }

    /// Spec of the stage at `ordinal`
    ///
    /// - pinned to the activity's node, in the activity workspace
    /// - one compiled command per step
    /// - an SCM binding when the stage is a lone source checkout
    /// - an upstream trigger on the previous stage unless the stage needs approval
    pub fn build(&self, activity: &Activity, ordinal: usize) -> Result<JobSpec> {
        let stage = activity
            .pipeline
            .stages
            .get(ordinal)
            .ok_or_else(|| EngineError::stage_index(ordinal))?;

        let commands = stage
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let services = services_for(activity, ordinal, i);
                self.compiler.compile(activity, step, &services)
            })
            .collect();

        let scm = match stage.steps.as_slice() {
            [step] => match &step.kind {
                StepKind::SourceCheckout(checkout) => Some(ScmBinding {
                    url: checkout.repository.clone(),
                    branch: checkout.branch.clone(),
                }),
                _ => None,
            },
            _ => None,
        };

        let upstream_trigger = if ordinal > 0 && !stage.need_approval {
            activity.job_name(ordinal - 1).map(UpstreamTrigger::on_success)
        } else {
            None
        };

        Ok(JobSpec {
            assigned_node: activity.node_name.clone(),
            custom_workspace: self.workspace(&activity.id),
            commands,
            scm,
            upstream_trigger,
            timestamps: true,
        })
    }

    /// Like [`build`](Self::build), with the checkout pinned to `commit`
    ///
    /// Only a stage with an SCM binding is affected.
    pub fn build_pinned(&self, activity: &Activity, ordinal: usize, commit: &str) -> Result<JobSpec> {
        let mut spec = self.build(activity, ordinal)?;
        if let Some(scm) = spec.scm.as_mut() {
            scm.branch = commit.to_string();
        }
        Ok(spec)
    }
}
