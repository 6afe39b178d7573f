//! Load, apply, commit.
//!
//! [`WorkflowService`] is the thin async layer between callers and the pure
//! [`WorkflowEngine`]: it loads a snapshot from a [`ShowSetStore`], runs the
//! engine, commits the result with the loaded revision, and publishes the
//! effects to subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    Action, ActivityEntry, Effect, PipelineStatus, Result, ShowSet, ShowSetStore,
    TransitionContext, TransitionOutcome, WorkflowEngine, WorkflowError,
};

/// Default channel capacity for published effects.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// An effect as delivered to subscribers, tagged with the ShowSet and the
/// revision it was committed at.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEffect {
    /// The ShowSet the effect belongs to.
    pub show_set_id: String,
    /// The revision written by the commit that produced the effect.
    pub revision: u64,
    /// The effect itself.
    pub effect: Effect,
}

/// Applies actions to stored ShowSets.
///
/// # Example
///
/// ```
/// use showset_workflow::{
///     Action, Actor, MemoryShowSetStore, Role, StageName, TransitionContext,
///     WorkflowEngine, WorkflowService,
/// };
///
/// # async fn example() -> showset_workflow::Result<()> {
/// let service = WorkflowService::new(WorkflowEngine::default(), MemoryShowSetStore::new());
/// service.create("SS-07-01", "Hall B", "Finale").await?;
///
/// let ctx = TransitionContext::new(Actor::new("m-1", Role::Modeller3d));
/// let action = Action::Start { stage: StageName::Screen, skip_version_increment: false };
/// let outcome = service.apply("SS-07-01", &ctx, &action).await?;
/// assert_eq!(outcome.show_set.revision, 2);
/// # Ok(())
/// # }
/// ```
pub struct WorkflowService<S: ShowSetStore> {
    engine: Arc<WorkflowEngine>,
    store: S,
    event_tx: broadcast::Sender<PublishedEffect>,
}

impl<S: ShowSetStore> WorkflowService<S> {
    /// Creates a service over an engine and a store.
    pub fn new(engine: impl Into<Arc<WorkflowEngine>>, store: S) -> Self {
        let (event_tx, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            engine: engine.into(),
            store,
            event_tx,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribes to committed effects.
    ///
    /// Effects are only published after a successful commit. Slow receivers
    /// may miss effects; the activity log in the store is authoritative.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEffect> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors (no subscribers or channel full).
    fn emit(&self, show_set_id: &str, revision: u64, effects: &[Effect]) {
        for effect in effects {
            let _ = self.event_tx.send(PublishedEffect {
                show_set_id: show_set_id.to_string(),
                revision,
                effect: effect.clone(),
            });
        }
    }

    /// Creates and stores a fresh ShowSet.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::DuplicateShowSet`] if the identifier is taken.
    pub async fn create(
        &self,
        show_set_id: impl Into<String>,
        area: impl Into<String>,
        scene: impl Into<String>,
    ) -> Result<ShowSet> {
        let mut show_set = self.engine.new_show_set(show_set_id, area, scene);
        show_set.revision = self.store.insert(&show_set).await?;
        info!(show_set_id = %show_set.show_set_id, "show set created");
        Ok(show_set)
    }

    /// Loads a ShowSet or fails with [`WorkflowError::ShowSetNotFound`].
    pub async fn load(&self, show_set_id: &str) -> Result<ShowSet> {
        self.store
            .load(show_set_id)
            .await?
            .ok_or_else(|| WorkflowError::ShowSetNotFound(show_set_id.to_string()))
    }

    /// Applies one action to the stored ShowSet.
    ///
    /// A no-op outcome is returned without writing. Otherwise the new
    /// snapshot and its activity entries are committed against the loaded
    /// revision, and the outcome carries the new revision.
    ///
    /// # Errors
    ///
    /// Any engine rejection, [`WorkflowError::ShowSetNotFound`], or
    /// [`WorkflowError::Conflict`] if another writer committed in between.
    pub async fn apply(
        &self,
        show_set_id: &str,
        ctx: &TransitionContext,
        action: &Action,
    ) -> Result<TransitionOutcome> {
        let span = info_span!("apply", show_set_id = %show_set_id, action = %action.kind());
        self.apply_internal(show_set_id, ctx, action)
            .instrument(span)
            .await
    }

    async fn apply_internal(
        &self,
        show_set_id: &str,
        ctx: &TransitionContext,
        action: &Action,
    ) -> Result<TransitionOutcome> {
        let loaded = self.load(show_set_id).await?;
        let expected = loaded.revision;

        let mut outcome = self.engine.apply_transition(&loaded, ctx, action)?;
        if outcome.is_noop() {
            debug!(revision = expected, "nothing to commit");
            return Ok(outcome);
        }

        let revision = self
            .store
            .commit(&outcome.show_set, expected, &outcome.effects)
            .await?;
        outcome.show_set.revision = revision;
        debug!(revision, effects = outcome.effects.len(), "committed");

        self.emit(show_set_id, revision, &outcome.effects);
        Ok(outcome)
    }

    /// Like [`apply`](Self::apply), but refetches and retries on
    /// [`WorkflowError::Conflict`], up to `max_attempts` tries in total.
    ///
    /// The action is re-evaluated against the fresh snapshot, so a retry can
    /// fail with a different error than the first attempt.
    pub async fn apply_with_retry(
        &self,
        show_set_id: &str,
        ctx: &TransitionContext,
        action: &Action,
        max_attempts: usize,
    ) -> Result<TransitionOutcome> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.apply(show_set_id, ctx, action).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(show_set_id, attempt, error = %e, "conflict, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Returns the pipeline view of a stored ShowSet.
    pub async fn status(&self, show_set_id: &str) -> Result<PipelineStatus> {
        let show_set = self.load(show_set_id).await?;
        Ok(self.engine.status(&show_set))
    }

    /// Returns the activity log of a ShowSet, oldest first.
    pub async fn activity(&self, show_set_id: &str) -> Result<Vec<ActivityEntry>> {
        self.store.activity(show_set_id).await
    }
}

impl<S: ShowSetStore + std::fmt::Debug> std::fmt::Debug for WorkflowService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("store", &self.store)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish_non_exhaustive()
    }
}
