//! In-memory ShowSet store implementation.
//!
//! This module provides [`MemoryShowSetStore`], a thread-safe in-memory
//! implementation of [`ShowSetStore`] suitable for testing and development.

use crate::{ActivityEntry, Effect, Result, ShowSet, WorkflowError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{activity_entries, ShowSetStore, INITIAL_REVISION};

/// Internal storage for the memory store.
#[derive(Debug, Default)]
struct Storage {
    /// Snapshots indexed by show_set_id.
    show_sets: HashMap<String, ShowSet>,
    /// Activity log indexed by show_set_id.
    activity: HashMap<String, Vec<ActivityEntry>>,
}

/// An in-memory implementation of [`ShowSetStore`].
///
/// This implementation uses `Arc<RwLock<...>>` internally, making it
/// safe to clone and share across async tasks. Clones see the same data.
/// The revision check and the write happen under one write lock.
///
/// # Example
///
/// ```
/// use showset_workflow::{MemoryShowSetStore, ShowSetStore, WorkflowEngine};
///
/// # async fn example() -> showset_workflow::Result<()> {
/// let store = MemoryShowSetStore::new();
/// let show_set = WorkflowEngine::default().new_show_set("SS-1", "A", "S");
/// store.insert(&show_set).await?;
/// assert_eq!(store.item_count().await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryShowSetStore {
    storage: Arc<RwLock<Storage>>,
}

impl MemoryShowSetStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(Storage::default())),
        }
    }

    /// Returns the number of ShowSets currently stored.
    ///
    /// Useful for testing.
    pub async fn item_count(&self) -> usize {
        self.storage.read().await.show_sets.len()
    }

    /// Clears all stored data.
    ///
    /// Useful for resetting state between tests.
    pub async fn clear(&self) {
        let mut storage = self.storage.write().await;
        storage.show_sets.clear();
        storage.activity.clear();
    }
}

impl Default for MemoryShowSetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShowSetStore for MemoryShowSetStore {
    async fn insert(&self, show_set: &ShowSet) -> Result<u64> {
        let mut storage = self.storage.write().await;
        if storage.show_sets.contains_key(&show_set.show_set_id) {
            return Err(WorkflowError::DuplicateShowSet(show_set.show_set_id.clone()));
        }
        let mut stored = show_set.clone();
        stored.revision = INITIAL_REVISION;
        storage.show_sets.insert(stored.show_set_id.clone(), stored);
        Ok(INITIAL_REVISION)
    }

    async fn load(&self, show_set_id: &str) -> Result<Option<ShowSet>> {
        let storage = self.storage.read().await;
        Ok(storage.show_sets.get(show_set_id).cloned())
    }

    async fn commit(
        &self,
        show_set: &ShowSet,
        expected_revision: u64,
        effects: &[Effect],
    ) -> Result<u64> {
        let mut storage = self.storage.write().await;
        let id = show_set.show_set_id.clone();
        let actual = storage
            .show_sets
            .get(&id)
            .map(|stored| stored.revision)
            .ok_or_else(|| WorkflowError::ShowSetNotFound(id.clone()))?;
        if actual != expected_revision {
            return Err(WorkflowError::Conflict {
                id,
                expected: expected_revision,
                actual,
            });
        }

        let revision = expected_revision + 1;
        let mut stored = show_set.clone();
        stored.revision = revision;
        storage.show_sets.insert(id.clone(), stored);
        storage
            .activity
            .entry(id)
            .or_default()
            .extend(activity_entries(effects));
        Ok(revision)
    }

    async fn activity(&self, show_set_id: &str) -> Result<Vec<ActivityEntry>> {
        let storage = self.storage.read().await;
        Ok(storage
            .activity
            .get(show_set_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, show_set_id: &str) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.show_sets.remove(show_set_id);
        storage.activity.remove(show_set_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let storage = self.storage.read().await;
        let mut ids: Vec<String> = storage.show_sets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
