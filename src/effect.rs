//! Side effects of an accepted transition.
//!
//! The engine never writes anything itself. Every accepted action returns an
//! ordered list of [`Effect`]s that the caller persists together with the new
//! snapshot and may publish on a real-time channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActionKind, Role, StageName, StageStatus, VersionHistoryEntry};

/// Why a stage changed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeCause {
    /// The stage the action targeted.
    Direct,
    /// Forced by a revision travelling back to `origin`.
    Cascade {
        /// The earliest stage sent back for revision.
        origin: StageName,
    },
    /// Reset by an admin unlock.
    Unlock,
    /// Set by an admin status override.
    Override,
}

/// One line of a ShowSet's activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// The ShowSet acted on.
    pub show_set_id: String,
    /// Who acted.
    pub user_id: String,
    /// The role they acted as.
    pub role: Role,
    /// What they did.
    pub action: ActionKind,
    /// The stage the action targeted, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    /// Short human-readable description.
    pub summary: String,
    /// When.
    pub at: DateTime<Utc>,
}

/// An effect produced by an accepted transition.
///
/// Effects are listed in the order they happened. The activity entry
/// describing the whole action always comes last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[non_exhaustive]
pub enum Effect {
    /// A stage record changed status.
    StageChanged {
        /// The stage.
        stage: StageName,
        /// Status before.
        from: StageStatus,
        /// Status after.
        to: StageStatus,
        /// What caused it.
        cause: ChangeCause,
        /// Who caused it.
        by: String,
        /// When.
        at: DateTime<Utc>,
    },

    /// A version group moved and a history entry was appended.
    VersionRecorded {
        /// The appended entry.
        entry: VersionHistoryEntry,
    },

    /// The ShowSet was locked.
    Locked {
        /// The admin who locked it.
        by: String,
        /// When.
        at: DateTime<Utc>,
    },

    /// The ShowSet was unlocked.
    Unlocked {
        /// The admin who unlocked it.
        by: String,
        /// When.
        at: DateTime<Utc>,
        /// Stages reset to `revision_required`.
        reset: Vec<StageName>,
    },

    /// An activity log line.
    Activity {
        /// The entry to append.
        entry: ActivityEntry,
    },
}

impl Effect {
    /// Returns the stage this effect concerns, if any.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::StageChanged { stage, .. } => Some(*stage),
            Self::Activity { entry } => entry.stage,
            Self::VersionRecorded { .. } | Self::Locked { .. } | Self::Unlocked { .. } => None,
        }
    }

    /// Returns true for a status change forced by a cascade.
    pub fn is_cascade(&self) -> bool {
        matches!(
            self,
            Self::StageChanged {
                cause: ChangeCause::Cascade { .. },
                ..
            }
        )
    }

    /// Returns the activity entry, if this is one.
    pub fn activity(&self) -> Option<&ActivityEntry> {
        match self {
            Self::Activity { entry } => Some(entry),
            _ => None,
        }
    }

    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StageChanged { .. } => "stage_changed",
            Self::VersionRecorded { .. } => "version_recorded",
            Self::Locked { .. } => "locked",
            Self::Unlocked { .. } => "unlocked",
            Self::Activity { .. } => "activity",
        }
    }
}
