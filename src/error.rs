//! Error types for the ShowSet workflow engine.
//!
//! Engine errors are grouped into a small closed set of [`ErrorKind`]s that
//! the API boundary maps to wire codes. Every engine error is local and
//! deterministic: retrying the same input reproduces the same error. Only
//! [`ErrorKind::Conflict`], raised by the persistence boundary, is worth
//! retrying after a refetch.

use std::fmt;

use thiserror::Error;

use crate::{Role, StageName, StageStatus, VersionGroup};

/// The kind of a [`WorkflowError`], independent of its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The role lacks the stage entirely.
    Forbidden,
    /// The role owns the stage but not the requested status.
    InvalidStatusForRole,
    /// The status change is not reachable from the current status.
    InvalidTransition,
    /// The ShowSet is administratively locked.
    Locked,
    /// A rejection or upstream revision was requested without a note.
    MissingRevisionNote,
    /// A version target is not strictly greater than the current version.
    VersionNotMonotonic,
    /// The snapshot changed since it was loaded.
    Conflict,
    /// The ShowSet does not exist in the store.
    NotFound,
    /// The storage backend failed.
    Storage,
    /// The workflow configuration is invalid.
    Config,
}

impl ErrorKind {
    /// Returns the stable wire code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidStatusForRole => "INVALID_STATUS_FOR_ROLE",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Locked => "LOCKED",
            Self::MissingRevisionNote => "MISSING_REVISION_NOTE",
            Self::VersionNotMonotonic => "VERSION_NOT_MONOTONIC",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE",
            Self::Config => "CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The main error type for workflow operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The role has no access to the stage.
    #[error("role {role} may not act on stage {stage}")]
    Forbidden {
        /// The acting role.
        role: Role,
        /// The stage that was requested.
        stage: StageName,
    },

    /// The role has no authority over a review state it tried to decide.
    #[error("role {role} has no authority over {status} on stage {stage}")]
    NotReviewAuthority {
        /// The acting role.
        role: Role,
        /// The stage under review.
        stage: StageName,
        /// The review status the stage is in.
        status: StageStatus,
    },

    /// The operation is reserved for administrators.
    #[error("{operation} requires admin, not {role}")]
    AdminOnly {
        /// The acting role.
        role: Role,
        /// The attempted operation.
        operation: &'static str,
    },

    /// The role owns the stage but may not set the requested status.
    #[error("role {role} may not set {stage} to {status}")]
    InvalidStatusForRole {
        /// The acting role.
        role: Role,
        /// The stage that was requested.
        stage: StageName,
        /// The requested status.
        status: StageStatus,
    },

    /// The requested change is not reachable from the current status.
    #[error("invalid transition on {stage}: {reason}")]
    InvalidTransition {
        /// The stage the transition targeted.
        stage: StageName,
        /// Human-readable reason.
        reason: String,
    },

    /// The stage is not part of the configured stage ordering.
    #[error("stage {0} is not part of this workflow")]
    StageNotInWorkflow(StageName),

    /// The ShowSet is locked and only `unlock` is accepted.
    #[error("show set {0} is locked")]
    Locked(String),

    /// `lock` was requested on a ShowSet that is already locked.
    #[error("show set {0} is already locked")]
    AlreadyLocked(String),

    /// `unlock` was requested on a ShowSet that is not locked.
    #[error("show set {0} is not locked")]
    NotLocked(String),

    /// A rejection or upstream revision arrived without a note.
    #[error("a revision note is required for {0}")]
    MissingRevisionNote(StageName),

    /// A version target did not exceed the current version.
    #[error("{group} target {target} must be greater than current {current}")]
    VersionNotMonotonic {
        /// The version group.
        group: VersionGroup,
        /// The current version.
        current: u32,
        /// The rejected target version.
        target: u32,
    },

    /// The stored revision differs from the one the caller loaded.
    #[error("show set {id} changed: expected revision {expected}, found {actual}")]
    Conflict {
        /// The ShowSet identifier.
        id: String,
        /// The revision the caller loaded.
        expected: u64,
        /// The revision currently stored.
        actual: u64,
    },

    /// ShowSet not found in the store.
    #[error("show set not found: {0}")]
    ShowSetNotFound(String),

    /// A ShowSet with the same identifier already exists.
    #[error("show set already exists: {0}")]
    DuplicateShowSet(String),

    /// Error occurred in the state store layer.
    #[error("State store error: {0}")]
    StateStore(String),

    /// Workflow configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from file or database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Forbidden { .. } | Self::NotReviewAuthority { .. } | Self::AdminOnly { .. } => {
                ErrorKind::Forbidden
            }
            Self::InvalidStatusForRole { .. } => ErrorKind::InvalidStatusForRole,
            Self::InvalidTransition { .. }
            | Self::StageNotInWorkflow(_)
            | Self::AlreadyLocked(_)
            | Self::NotLocked(_) => ErrorKind::InvalidTransition,
            Self::Locked(_) => ErrorKind::Locked,
            Self::MissingRevisionNote(_) => ErrorKind::MissingRevisionNote,
            Self::VersionNotMonotonic { .. } => ErrorKind::VersionNotMonotonic,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ShowSetNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateShowSet(_) | Self::StateStore(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Serialization(_) => ErrorKind::Storage,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Returns true if the caller should refetch and retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub(crate) fn invalid_transition(stage: StageName, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for WorkflowError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// A specialized `Result` type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;
