//! Deliverable version counters and the policy that moves them.
//!
//! Versions only ever go up. A routine revision cycle (`revision_required`
//! back to `in_progress`) bumps the stage's group automatically; reopening
//! settled work never does, and must be recorded through an explicit
//! `setVersion` so the history can tell the two apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, StageName, StageStatus, WorkflowError};

/// A version counter shared by one or more stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionGroup {
    /// `screen`.
    #[serde(rename = "screenVersion")]
    Screen,
    /// `structure` and `integrated`.
    #[serde(rename = "revitVersion")]
    Revit,
    /// `drawing2d`.
    #[serde(rename = "drawingVersion")]
    Drawing,
}

impl VersionGroup {
    /// All groups.
    pub const ALL: [VersionGroup; 3] = [VersionGroup::Screen, VersionGroup::Revit, VersionGroup::Drawing];

    /// Returns the group a stage belongs to; `inBim360` has none.
    pub fn for_stage(stage: StageName) -> Option<Self> {
        match stage {
            StageName::Screen => Some(Self::Screen),
            StageName::Structure | StageName::Integrated => Some(Self::Revit),
            StageName::Drawing2d => Some(Self::Drawing),
            StageName::InBim360 => None,
        }
    }

    /// Returns the stages sharing this counter.
    pub fn stages(self) -> &'static [StageName] {
        match self {
            Self::Screen => &[StageName::Screen],
            Self::Revit => &[StageName::Structure, StageName::Integrated],
            Self::Drawing => &[StageName::Drawing2d],
        }
    }

    /// Returns the first stage of the group.
    pub fn lead_stage(self) -> StageName {
        match self {
            Self::Screen => StageName::Screen,
            Self::Revit => StageName::Structure,
            Self::Drawing => StageName::Drawing2d,
        }
    }

    /// Returns the wire name of this group.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screenVersion",
            Self::Revit => "revitVersion",
            Self::Drawing => "drawingVersion",
        }
    }
}

impl fmt::Display for VersionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three version counters of a ShowSet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCounters {
    /// Screen deliverable version.
    pub screen_version: u32,
    /// Revit model version, shared by `structure` and `integrated`.
    pub revit_version: u32,
    /// 2D drawing version.
    pub drawing_version: u32,
}

impl VersionCounters {
    /// Returns the current value of a group.
    pub fn get(&self, group: VersionGroup) -> u32 {
        match group {
            VersionGroup::Screen => self.screen_version,
            VersionGroup::Revit => self.revit_version,
            VersionGroup::Drawing => self.drawing_version,
        }
    }

    fn slot(&mut self, group: VersionGroup) -> &mut u32 {
        match group {
            VersionGroup::Screen => &mut self.screen_version,
            VersionGroup::Revit => &mut self.revit_version,
            VersionGroup::Drawing => &mut self.drawing_version,
        }
    }
}

impl Default for VersionCounters {
    fn default() -> Self {
        Self {
            screen_version: 1,
            revit_version: 1,
            drawing_version: 1,
        }
    }
}

/// Why a version was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VersionReason {
    /// A stage went from `revision_required` back to `in_progress`.
    Revision {
        /// The stage that resumed work.
        stage: StageName,
    },
    /// An explicit `setVersion` call.
    Manual {
        /// The reason as written.
        text: String,
        /// Language code of `text`.
        language: String,
    },
}

/// One immutable line of a ShowSet's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryEntry {
    /// The group that moved.
    pub version_type: VersionGroup,
    /// The new version.
    pub version: u32,
    /// Why it moved.
    pub reason: VersionReason,
    /// When it moved.
    pub created_at: DateTime<Utc>,
    /// Who moved it.
    pub created_by: String,
}

/// Version policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionPolicy;

impl VersionPolicy {
    /// Decides whether a status change auto-increments a version group.
    ///
    /// Only `revision_required -> in_progress` on a versioned stage does,
    /// and only when the caller has not opted out.
    pub fn auto_increment(
        &self,
        stage: StageName,
        from: StageStatus,
        to: StageStatus,
        skip_version_increment: bool,
    ) -> Option<VersionGroup> {
        if skip_version_increment
            || from != StageStatus::RevisionRequired
            || to != StageStatus::InProgress
        {
            return None;
        }
        VersionGroup::for_stage(stage)
    }

    /// Bumps a group by one and returns the history entry for it.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::VersionNotMonotonic`] when the group is already at
    /// `u32::MAX`; the counters are left untouched.
    pub fn increment(
        &self,
        counters: &mut VersionCounters,
        group: VersionGroup,
        reason: VersionReason,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<VersionHistoryEntry> {
        let current = counters.get(group);
        let next = current
            .checked_add(1)
            .ok_or(WorkflowError::VersionNotMonotonic {
                group,
                current,
                target: current,
            })?;
        *counters.slot(group) = next;
        Ok(VersionHistoryEntry {
            version_type: group,
            version: next,
            reason,
            created_at: at,
            created_by: by.to_string(),
        })
    }

    /// Sets a group to an explicit higher version.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::VersionNotMonotonic`] unless `target` is strictly
    /// greater than the current value.
    pub fn set_version(
        &self,
        counters: &mut VersionCounters,
        group: VersionGroup,
        target: u32,
        reason: VersionReason,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<VersionHistoryEntry> {
        let current = counters.get(group);
        if target <= current {
            return Err(WorkflowError::VersionNotMonotonic {
                group,
                current,
                target,
            });
        }
        *counters.slot(group) = target;
        Ok(VersionHistoryEntry {
            version_type: group,
            version: target,
            reason,
            created_at: at,
            created_by: by.to_string(),
        })
    }
}
