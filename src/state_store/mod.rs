//! Persistence boundary for ShowSet snapshots.
//!
//! The engine is pure; this module is where its output is written back.
//! Writes use optimistic concurrency: every stored snapshot carries a
//! `revision`, and [`ShowSetStore::commit`] only succeeds if the caller's
//! snapshot was loaded at the revision currently stored. Otherwise it fails
//! with [`WorkflowError::Conflict`](crate::WorkflowError::Conflict) and the
//! caller refetches.
//!
//! Implementations:
//!
//! - [`MemoryShowSetStore`]: thread-safe in-memory storage for testing/development
//! - `SqliteShowSetStore` (feature `sqlite`): durable storage backed by SQLite
//!
//! # Example
//!
//! ```
//! use showset_workflow::{MemoryShowSetStore, ShowSetStore, WorkflowEngine};
//!
//! # async fn example() -> showset_workflow::Result<()> {
//! let store = MemoryShowSetStore::new();
//! let engine = WorkflowEngine::default();
//!
//! let revision = store.insert(&engine.new_show_set("SS-07-01", "Hall B", "Finale")).await?;
//! let loaded = store.load("SS-07-01").await?.expect("just inserted");
//! assert_eq!(loaded.revision, revision);
//! # Ok(())
//! # }
//! ```

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryShowSetStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteShowSetStore;

use crate::{ActivityEntry, Effect, Result, ShowSet};
use async_trait::async_trait;

/// Revision given to a newly inserted ShowSet.
pub const INITIAL_REVISION: u64 = 1;

/// A trait for persisting ShowSet snapshots and their activity log.
///
/// All methods take `&self`; implementations synchronise internally, so a
/// store can be cloned or shared across request handlers.
///
/// # Object Safety
///
/// This trait is object-safe, allowing for dynamic dispatch with
/// `dyn ShowSetStore`.
#[async_trait]
pub trait ShowSetStore: Send + Sync {
    /// Stores a new ShowSet at [`INITIAL_REVISION`].
    ///
    /// # Errors
    ///
    /// [`WorkflowError::DuplicateShowSet`](crate::WorkflowError::DuplicateShowSet)
    /// if the identifier is taken.
    async fn insert(&self, show_set: &ShowSet) -> Result<u64>;

    /// Loads the current snapshot.
    ///
    /// Returns `Ok(None)` if the ShowSet does not exist.
    async fn load(&self, show_set_id: &str) -> Result<Option<ShowSet>>;

    /// Atomically replaces the snapshot and appends the activity entries
    /// found in `effects`.
    ///
    /// Succeeds only if the stored revision equals `expected_revision`, and
    /// returns the new revision.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Conflict`](crate::WorkflowError::Conflict) if the
    ///   stored revision moved on
    /// - [`WorkflowError::ShowSetNotFound`](crate::WorkflowError::ShowSetNotFound)
    ///   if the ShowSet does not exist
    async fn commit(
        &self,
        show_set: &ShowSet,
        expected_revision: u64,
        effects: &[Effect],
    ) -> Result<u64>;

    /// Returns the activity log of a ShowSet, oldest first.
    async fn activity(&self, show_set_id: &str) -> Result<Vec<ActivityEntry>>;

    /// Deletes a ShowSet and its activity log.
    async fn delete(&self, show_set_id: &str) -> Result<()>;

    /// Lists all stored ShowSet ids, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Collects the activity entries of an effect list.
pub(crate) fn activity_entries(effects: &[Effect]) -> Vec<ActivityEntry> {
    effects
        .iter()
        .filter_map(Effect::activity)
        .cloned()
        .collect()
}
