//! Request shapes accepted by the engine.
//!
//! An [`Action`] is what the API boundary hands over after decoding a request
//! body. The JSON form is internally tagged by `action`:
//!
//! ```
//! use showset_workflow::{Action, StageName};
//!
//! let action: Action = serde_json::from_str(
//!     r#"{"action":"start","stage":"drawing2d","skipVersionIncrement":false}"#,
//! )?;
//! assert_eq!(action.stage(), Some(StageName::Drawing2d));
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{StageName, StageStatus, VersionGroup};

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Approve the current review step.
    Complete,
    /// Send the stage back with a note.
    RevisionRequired,
}

impl ReviewDecision {
    /// The status the decision asks for.
    pub fn status(self) -> StageStatus {
        match self {
            Self::Complete => StageStatus::Complete,
            Self::RevisionRequired => StageStatus::RevisionRequired,
        }
    }
}

/// The stages a user is currently working on.
///
/// Supplied by the session layer as a hint. It may be stale; the engine
/// skips entries that no longer apply instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingContext {
    /// The session owner.
    pub user_id: String,
    /// Stages in the session.
    pub stages: Vec<StageName>,
}

impl WorkingContext {
    /// Creates a working context.
    pub fn new(user_id: impl Into<String>, stages: impl IntoIterator<Item = StageName>) -> Self {
        Self {
            user_id: user_id.into(),
            stages: stages.into_iter().collect(),
        }
    }
}

/// A transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    /// Begin or resume work on a stage.
    Start {
        /// The stage.
        stage: StageName,
        /// Suppress the automatic version bump after a revision.
        #[serde(default)]
        skip_version_increment: bool,
    },

    /// Finish a unit of work on a stage.
    Finish {
        /// The stage.
        stage: StageName,
        /// Hand the work on instead of continuing.
        #[serde(default)]
        mark_complete: bool,
    },

    /// Finish every stage in the caller's working context.
    FinishSession {
        /// Hand the work on instead of continuing.
        #[serde(default)]
        mark_complete: bool,
    },

    /// Decide a review state.
    Approve {
        /// The stage under review.
        stage: StageName,
        /// The verdict.
        decision: ReviewDecision,
        /// Required when rejecting.
        #[serde(default)]
        revision_note: Option<String>,
        /// Language code of the note.
        #[serde(default)]
        revision_note_lang: Option<String>,
    },

    /// Pull work out of review back to a stage at or before it.
    Recall {
        /// The stage currently in review.
        review_stage: StageName,
        /// The stage to resume work on.
        target_stage: StageName,
        /// Start the target at once instead of flagging it for revision.
        #[serde(default)]
        start_immediately: bool,
    },

    /// Send earlier stages back for revision.
    RequestUpstreamRevision {
        /// Stages to send back.
        target_stages: Vec<StageName>,
        /// The requesting stage.
        current_stage: StageName,
        /// What needs to change.
        revision_note: String,
        /// Language code of the note.
        #[serde(default)]
        revision_note_lang: Option<String>,
        /// Attachment id, passed through untouched.
        #[serde(default)]
        attachment: Option<String>,
    },

    /// Record an explicit higher version.
    SetVersion {
        /// The group to move.
        version_type: VersionGroup,
        /// The new version.
        target_version: u32,
        /// Why.
        reason: String,
        /// Language code of `reason`.
        language: String,
    },

    /// Admin override of a stage status.
    SetStatus {
        /// The stage.
        stage: StageName,
        /// The status to set.
        status: StageStatus,
        /// Kept only when `status` is `revision_required`.
        #[serde(default)]
        revision_note: Option<String>,
    },

    /// Freeze the ShowSet.
    Lock,

    /// Unfreeze the ShowSet, reopening the listed complete stages.
    Unlock {
        /// Complete stages to move to `revision_required`.
        #[serde(default)]
        stages_to_reset: Vec<StageName>,
    },
}

impl Action {
    /// Returns the kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Start { .. } => ActionKind::Start,
            Self::Finish { .. } => ActionKind::Finish,
            Self::FinishSession { .. } => ActionKind::FinishSession,
            Self::Approve { .. } => ActionKind::Approve,
            Self::Recall { .. } => ActionKind::Recall,
            Self::RequestUpstreamRevision { .. } => ActionKind::RequestUpstreamRevision,
            Self::SetVersion { .. } => ActionKind::SetVersion,
            Self::SetStatus { .. } => ActionKind::SetStatus,
            Self::Lock => ActionKind::Lock,
            Self::Unlock { .. } => ActionKind::Unlock,
        }
    }

    /// Returns the stage the action is addressed to, if it has one.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::Start { stage, .. }
            | Self::Finish { stage, .. }
            | Self::Approve { stage, .. }
            | Self::SetStatus { stage, .. } => Some(*stage),
            Self::Recall { review_stage, .. } => Some(*review_stage),
            Self::RequestUpstreamRevision { current_stage, .. } => Some(*current_stage),
            Self::FinishSession { .. }
            | Self::SetVersion { .. }
            | Self::Lock
            | Self::Unlock { .. } => None,
        }
    }
}

/// The kind of an [`Action`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// `start`
    Start,
    /// `finish`
    Finish,
    /// `finishSession`
    FinishSession,
    /// `approve`
    Approve,
    /// `recall`
    Recall,
    /// `requestUpstreamRevision`
    RequestUpstreamRevision,
    /// `setVersion`
    SetVersion,
    /// `setStatus`
    SetStatus,
    /// `lock`
    Lock,
    /// `unlock`
    Unlock,
}

impl ActionKind {
    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::FinishSession => "finishSession",
            Self::Approve => "approve",
            Self::Recall => "recall",
            Self::RequestUpstreamRevision => "requestUpstreamRevision",
            Self::SetVersion => "setVersion",
            Self::SetStatus => "setStatus",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }

    /// Returns true for the two actions a lock does not block.
    pub fn bypasses_lock(self) -> bool {
        matches!(self, Self::Lock | Self::Unlock)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
