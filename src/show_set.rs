//! The ShowSet aggregate.
//!
//! A [`ShowSet`] is a plain snapshot. The engine reads one and returns a new
//! one; it never holds a reference across calls and never mutates its input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    StageName, StageOrdering, StageRecord, StageStatus, VersionCounters, VersionGroup,
    VersionHistoryEntry,
};

/// A production item moving through the stage pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSet {
    /// Stable, human-assigned identifier.
    pub show_set_id: String,
    /// Area descriptor.
    pub area: String,
    /// Scene descriptor.
    pub scene: String,
    /// Exactly one record per stage of the ordering.
    pub stages: BTreeMap<StageName, StageRecord>,
    /// Deliverable versions.
    #[serde(flatten)]
    pub versions: VersionCounters,
    /// Append-only version history.
    #[serde(default)]
    pub version_history: Vec<VersionHistoryEntry>,
    /// Set while the ShowSet is locked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    /// Admin who locked the ShowSet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    /// Optimistic-concurrency token, bumped by the store on every commit.
    #[serde(default)]
    pub revision: u64,
}

impl ShowSet {
    /// Creates a ShowSet with every stage of the ordering `not_started`.
    pub fn new(
        show_set_id: impl Into<String>,
        area: impl Into<String>,
        scene: impl Into<String>,
        ordering: &StageOrdering,
    ) -> Self {
        Self {
            show_set_id: show_set_id.into(),
            area: area.into(),
            scene: scene.into(),
            stages: ordering
                .stages()
                .iter()
                .map(|stage| (*stage, StageRecord::new()))
                .collect(),
            versions: VersionCounters::default(),
            version_history: Vec::new(),
            locked_at: None,
            locked_by: None,
            revision: 0,
        }
    }

    /// Returns the identifier.
    pub fn id(&self) -> &str {
        &self.show_set_id
    }

    /// Returns the record of a stage.
    pub fn record(&self, stage: StageName) -> Option<&StageRecord> {
        self.stages.get(&stage)
    }

    pub(crate) fn record_mut(&mut self, stage: StageName) -> Option<&mut StageRecord> {
        self.stages.get_mut(&stage)
    }

    /// Returns the status of a stage.
    pub fn status(&self, stage: StageName) -> Option<StageStatus> {
        self.record(stage).map(|record| record.status)
    }

    /// Returns the current value of a version group.
    pub fn version(&self, group: VersionGroup) -> u32 {
        self.versions.get(group)
    }

    /// Returns true while administratively locked.
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// The first stage of the ordering that is not complete.
    ///
    /// Derived on every call; never stored.
    pub fn current_stage(&self, ordering: &StageOrdering) -> Option<StageName> {
        ordering
            .stages()
            .iter()
            .copied()
            .find(|stage| self.status(*stage) != Some(StageStatus::Complete))
    }

    /// Returns true when every stage of the ordering is complete.
    pub fn is_complete(&self, ordering: &StageOrdering) -> bool {
        self.current_stage(ordering).is_none()
    }

    /// Returns the stages currently holding a status, in pipeline order.
    pub fn stages_with(&self, status: StageStatus) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(stage, _)| *stage)
            .collect()
    }
}
