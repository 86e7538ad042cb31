//! Activity and pipeline persistence

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use conduit_core::{Activity, Pipeline};

use crate::error::Result;

/// Persistence used by the engine
///
/// Records are stored whole; the engine serializes writers per activity, so
/// implementations only need last-write-wins semantics.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn get_activity(&self, id: &str) -> Result<Option<Activity>>;

    async fn put_activity(&self, activity: &Activity) -> Result<()>;

    /// Activities that have not reached a terminal status
    async fn list_active_activities(&self) -> Result<Vec<Activity>>;

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>>;

    async fn put_pipeline(&self, pipeline: &Pipeline) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: RwLock<HashMap<String, Activity>>,
    pipelines: RwLock<HashMap<String, Pipeline>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn get_activity(&self, id: &str) -> Result<Option<Activity>> {
        let activities = self.activities.read().unwrap_or_else(PoisonError::into_inner);
        Ok(activities.get(id).cloned())
    }

    async fn put_activity(&self, activity: &Activity) -> Result<()> {
        let mut activities = self.activities.write().unwrap_or_else(PoisonError::into_inner);
        activities.insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn list_active_activities(&self) -> Result<Vec<Activity>> {
        let activities = self.activities.read().unwrap_or_else(PoisonError::into_inner);
        Ok(activities
            .values()
            .filter(|activity| !activity.is_complete())
            .cloned()
            .collect())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>> {
        let pipelines = self.pipelines.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pipelines.get(id).cloned())
    }

    async fn put_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        let mut pipelines = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        pipelines.insert(pipeline.id.clone(), pipeline.clone());
        Ok(())
    }
}
