//! Task cache manager
//!
//! Owns the per-owner cached task snapshot persisted in the key-value store.
//! A valid snapshot (unexpired, owner-matching) is served without touching
//! the network; otherwise a remote fetch replaces it wholesale. When the
//! fetch fails, the last snapshot for that owner is served even if stale,
//! and the error is only propagated when there is nothing to fall back to.

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::api::TaskSource;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::{Task, TaskSnapshot};

fn snapshot_key(owner_id: i64) -> String {
    format!("tasks-snapshot-{}", owner_id)
}

/// Cache manager for task snapshots.
pub struct TaskCache {
    expiry: Duration,
    /// Serializes remote fetches so concurrent callers coalesce into one.
    fetch_lock: Mutex<()>,
}

impl TaskCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            fetch_lock: Mutex::new(()),
        }
    }

    /// Return the freshest available tasks for `owner_id`.
    ///
    /// `hours_back` is the lookback window handed to the source on a miss.
    /// With `force_refresh` the snapshot is bypassed but still updated.
    pub async fn get_tasks<S: TaskSource>(
        &self,
        store: &KvStore,
        source: &S,
        owner_id: i64,
        hours_back: i64,
        force_refresh: bool,
    ) -> Result<Vec<Task>> {
        if !force_refresh {
            if let Some(snapshot) = self.load_valid(store, owner_id) {
                tracing::debug!(owner_id, count = snapshot.tasks.len(), "Cache hit");
                return Ok(snapshot.tasks);
            }
        }

        let _guard = self.fetch_lock.lock().await;

        // A caller that waited on the lock re-checks: the fetch it queued
        // behind has usually already refreshed the snapshot.
        if !force_refresh {
            if let Some(snapshot) = self.load_valid(store, owner_id) {
                tracing::debug!(owner_id, "Coalesced into a finished fetch");
                return Ok(snapshot.tasks);
            }
        }

        match source.fetch_tasks(hours_back).await {
            Ok(tasks) => {
                let snapshot = TaskSnapshot::new(tasks.clone(), owner_id, Utc::now());
                store.set(&snapshot_key(owner_id), &serde_json::to_string(&snapshot)?)?;
                tracing::info!(owner_id, count = tasks.len(), "Task snapshot refreshed");
                Ok(tasks)
            }
            Err(e) => {
                // Stale data beats no data; the error only surfaces when
                // there is no snapshot at all.
                if let Some(snapshot) = self.load_any(store, owner_id) {
                    tracing::warn!(owner_id, error = %e, "Fetch failed, serving stale snapshot");
                    return Ok(snapshot.tasks);
                }
                Err(e)
            }
        }
    }

    /// Remove any snapshot for `owner_id` (configured user changed, or an
    /// explicit cache clear).
    pub fn invalidate(&self, store: &KvStore, owner_id: i64) -> Result<()> {
        store.remove(&snapshot_key(owner_id))?;
        tracing::info!(owner_id, "Task snapshot invalidated");
        Ok(())
    }

    fn load_valid(&self, store: &KvStore, owner_id: i64) -> Option<TaskSnapshot> {
        self.load_any(store, owner_id)
            .filter(|s| s.is_valid(Utc::now(), owner_id, self.expiry))
    }

    /// Load whatever snapshot exists, valid or stale. A malformed payload is
    /// a cache miss: the entry is discarded so the next fetch rebuilds it.
    fn load_any(&self, store: &KvStore, owner_id: i64) -> Option<TaskSnapshot> {
        let key = snapshot_key(owner_id);
        let raw = store.get(&key).ok().flatten()?;

        match serde_json::from_str::<TaskSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Discarding malformed task snapshot");
                let _ = store.remove(&key);
                None
            }
        }
    }
}
