//! # ShowSet Workflow
//!
//! A stage-transition engine for ShowSets, the production items that move
//! through screen modelling, structure, integration, BIM 360 publication
//! and 2D drawing.
//!
//! The engine is a pure function over snapshots: it takes a [`ShowSet`], an
//! actor and an [`Action`], and returns either a typed [`WorkflowError`] or
//! a new snapshot plus the ordered [`Effect`]s that describe what changed.
//! Nothing is written until the caller commits the outcome through a
//! [`ShowSetStore`], which rejects stale writes with a conflict.
//!
//! - [`RoleCapability`] decides which role may touch which stage and status
//! - [`StageTransitionRule`] decides which status changes are reachable
//! - [`CascadeResolver`] propagates revisions and completions downstream
//! - [`VersionPolicy`] keeps deliverable versions monotonic
//! - [`LockGuard`] freezes a ShowSet for everyone but the admin unlock
//!
//! ## Quick Example
//!
//! ```
//! use showset_workflow::{Action, Actor, Role, StageName, StageStatus, TransitionContext, WorkflowEngine};
//!
//! let engine = WorkflowEngine::default();
//! let show_set = engine.new_show_set("SS-07-01", "Hall B", "Finale");
//!
//! let ctx = TransitionContext::new(Actor::new("m-1", Role::Modeller3d));
//! let outcome = engine
//!     .apply_transition(&show_set, &ctx, &Action::Start {
//!         stage: StageName::Screen,
//!         skip_version_increment: false,
//!     })
//!     .unwrap();
//!
//! assert_eq!(outcome.show_set.status(StageName::Screen), Some(StageStatus::InProgress));
//! // the input snapshot is untouched
//! assert_eq!(show_set.status(StageName::Screen), Some(StageStatus::NotStarted));
//! ```
//!
//! For persistence, event publication and conflict retries, wrap the engine
//! in a [`WorkflowService`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

pub mod action;
pub mod cascade;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod lock;
pub mod ordering;
pub mod role;
pub mod service;
pub mod show_set;
pub mod stage;
pub mod state_store;
pub mod status;
pub mod transition;
pub mod version;

pub use action::{Action, ActionKind, ReviewDecision, WorkingContext};
pub use cascade::CascadeResolver;
pub use config::{BimCoordinatorScope, OrderingVariant, StructureReview, WorkflowVariant};
pub use effect::{ActivityEntry, ChangeCause, Effect};
pub use engine::{TransitionContext, TransitionOutcome, WorkflowEngine, WorkflowEngineBuilder};
pub use error::{ErrorKind, Result, WorkflowError};
pub use lock::LockGuard;
pub use ordering::StageOrdering;
pub use role::{Actor, Role, RoleCapability, RoleGrant, StageScope, StatusScope};
pub use service::{PublishedEffect, WorkflowService};
pub use show_set::ShowSet;
pub use stage::{RevisionNote, StageName, StageRecord, StageStatus};
pub use state_store::{MemoryShowSetStore, ShowSetStore, INITIAL_REVISION};
pub use status::{PipelineStatus, StageStatusEntry};
pub use transition::{ReviewRoute, StageTransitionRule};
pub use version::{VersionCounters, VersionGroup, VersionHistoryEntry, VersionPolicy, VersionReason};

#[cfg(feature = "sqlite")]
pub use state_store::SqliteShowSetStore;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_returns_valid_semver() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
