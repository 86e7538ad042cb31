//! Service containers started by container-task steps
//!
//! A task flagged as a service is started detached under a container name
//! derived from the activity id and its alias. Every later task of the same
//! activity links to it; the completion handler removes it.

use conduit_core::Activity;
use conduit_core::domain::step::{Step, StepKind};
use serde::{Deserialize, Serialize};

/// A detached container reachable by later steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CIService {
    /// Name of the running container
    pub container_name: String,
    /// Link alias other steps resolve it by
    pub name: String,
    pub image: String,
}

/// Container name of a service step of an activity
pub fn container_name(activity_id: &str, alias: &str) -> String {
    format!("{}{}", activity_id, alias)
}

fn service_of(activity_id: &str, step: &Step) -> Option<CIService> {
    let StepKind::ContainerTask(task) = &step.kind else {
        return None;
    };
    if !task.is_service {
        return None;
    }
    let alias = task.alias.as_deref().unwrap_or_default();
    Some(CIService {
        container_name: container_name(activity_id, alias),
        name: alias.to_string(),
        image: task.image.clone(),
    })
}

/// Services declared strictly before the step at (`stage`, `step`)
pub fn services_for(activity: &Activity, stage: usize, step: usize) -> Vec<CIService> {
    activity
        .pipeline
        .stages
        .iter()
        .enumerate()
        .flat_map(|(i, s)| {
            let limit = if i < stage {
                s.steps.len()
            } else if i == stage {
                step.min(s.steps.len())
            } else {
                0
            };
            s.steps[..limit].iter()
        })
        .filter_map(|s| service_of(&activity.id, s))
        .collect()
}

/// Every service an activity declares
pub fn all_services(activity: &Activity) -> Vec<CIService> {
    activity
        .pipeline
        .stages
        .iter()
        .flat_map(|stage| stage.steps.iter())
        .filter_map(|step| service_of(&activity.id, step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pipeline_with, task_step, service_step};

    #[test]
    fn test_services_for_sees_only_earlier_services() {
        let pipeline = pipeline_with(vec![
            ("db", vec![service_step("mysql", "mysql:8", "db")]),
            ("test", vec![task_step("unit", "echo hi"), service_step("cache", "redis", "cache")]),
        ]);
        let activity = Activity::new("act1".to_string(), pipeline, "n1".to_string(), 0);

        let before_db = services_for(&activity, 1, 0);
        assert!(before_db.is_empty());

        let unit = services_for(&activity, 2, 0);
        assert_eq!(unit.len(), 1);
        assert_eq!(unit[0].container_name, "act1db");
        assert_eq!(unit[0].name, "db");

        let after_cache = services_for(&activity, 3, 0);
        assert_eq!(after_cache.len(), 2);
    }

    #[test]
    fn test_all_services_lists_every_service() {
        let pipeline = pipeline_with(vec![
            ("db", vec![service_step("mysql", "mysql:8", "db")]),
            ("test", vec![task_step("unit", "echo hi"), service_step("cache", "redis", "cache")]),
        ]);
        let activity = Activity::new("act1".to_string(), pipeline, "n1".to_string(), 0);

        let names: Vec<_> = all_services(&activity)
            .into_iter()
            .map(|service| service.container_name)
            .collect();
        assert_eq!(names, vec!["act1db", "act1cache"]);
    }
}
