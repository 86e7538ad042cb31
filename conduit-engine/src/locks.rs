//! Per-activity mutual exclusion
//!
//! Every read-modify-write of an activity (sync, run, rerun, approval) holds
//! the activity's lock, so concurrent writers never interleave. Updates of a
//! pipeline record hold the pipeline's entry, always taken after the
//! activity's. Entries are created on first use. An activity entry is retired
//! once the activity is terminal and nothing holds or waits on it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock key of a pipeline record, disjoint from activity ids
pub fn pipeline_key(pipeline_id: &str) -> String {
    format!("pipeline/{}", pipeline_id)
}

#[derive(Debug, Clone, Default)]
pub struct ActivityLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ActivityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to activity `id`
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(id.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Run `work` holding the entry of `key`, retiring the entry afterwards
    pub async fn exclusive<F: Future>(&self, key: &str, work: F) -> F::Output {
        let guard = self.lock(key).await;
        let output = work.await;
        drop(guard);
        self.retire(key);
        output
    }

    /// Drop the entry of `id` if no guard or waiter references it
    ///
    /// Returns whether the entry is gone.
    pub fn retire(&self, id: &str) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get(id) {
            Some(entry) if Arc::strong_count(entry) == 1 => {
                map.remove(id);
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
