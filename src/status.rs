//! Pipeline status reporting and visualization.
//!
//! This module provides [`PipelineStatus`], a read-only view of where a
//! ShowSet is in the pipeline. Nothing here is stored; it is rebuilt from
//! the snapshot on every call.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{ShowSet, StageName, StageOrdering, StageStatus, VersionCounters};

/// Status entry for a single stage within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatusEntry {
    /// The stage.
    pub stage: StageName,
    /// The current status of this stage.
    pub status: StageStatus,
    /// Last user to change the status.
    pub updated_by: Option<String>,
    /// When the status last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// Revision note text, while `revision_required`.
    pub revision_note: Option<String>,
}

impl StageStatusEntry {
    /// Creates a `not_started` entry.
    pub fn not_started(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::NotStarted,
            updated_by: None,
            updated_at: None,
            revision_note: None,
        }
    }

    /// Returns a status indicator character.
    pub fn status_char(&self) -> char {
        match self.status {
            StageStatus::NotStarted => '⏳',       // Hourglass
            StageStatus::InProgress => '🔄',       // Spinning arrows
            StageStatus::EngineerReview => '👀',   // Eyes (awaiting review)
            StageStatus::ClientReview => '📨',     // Sent to client
            StageStatus::RevisionRequired => '🔁', // Back for rework
            StageStatus::Complete => '✅',         // Green check
            StageStatus::OnHold => '⏸',           // Paused by admin
        }
    }
}

/// The complete status of the pipeline for a ShowSet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// The ShowSet identifier.
    pub show_set_id: String,
    /// Status of each stage in pipeline order.
    pub stages: Vec<StageStatusEntry>,
    /// First stage that is not complete.
    pub current_stage: Option<StageName>,
    /// Lock holder, while locked.
    pub locked_by: Option<String>,
    /// Current deliverable versions.
    pub versions: VersionCounters,
}

impl PipelineStatus {
    /// Builds the view from a snapshot.
    pub fn from_show_set(show_set: &ShowSet, ordering: &StageOrdering) -> Self {
        let stages = ordering
            .stages()
            .iter()
            .map(|stage| match show_set.record(*stage) {
                Some(record) => StageStatusEntry {
                    stage: *stage,
                    status: record.status,
                    updated_by: record.updated_by.clone(),
                    updated_at: record.updated_at,
                    revision_note: record.revision_note.as_ref().map(|n| n.text.clone()),
                },
                None => StageStatusEntry::not_started(*stage),
            })
            .collect();

        Self {
            show_set_id: show_set.show_set_id.clone(),
            stages,
            current_stage: show_set.current_stage(ordering),
            locked_by: show_set.locked_by.clone(),
            versions: show_set.versions,
        }
    }

    /// Returns true if all stages are completed.
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Complete)
    }

    /// Returns true while the ShowSet is locked.
    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    /// Returns the stages awaiting engineer or client review.
    pub fn review_stages(&self) -> Vec<StageName> {
        self.filter(StageStatus::is_review)
    }

    /// Returns the stages sent back for revision.
    pub fn revision_stages(&self) -> Vec<StageName> {
        self.filter(|s| s == StageStatus::RevisionRequired)
    }

    /// Returns the stages being worked on.
    pub fn running_stages(&self) -> Vec<StageName> {
        self.filter(|s| s == StageStatus::InProgress)
    }

    fn filter(&self, keep: impl Fn(StageStatus) -> bool) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|s| keep(s.status))
            .map(|s| s.stage)
            .collect()
    }

    /// Returns the overall progress as a percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.stages.is_empty() {
            return 100.0;
        }

        let completed = self
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Complete)
            .count();

        (completed as f32 / self.stages.len() as f32) * 100.0
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline status for show set \"{}\":", self.show_set_id)?;
        writeln!(f)?;

        for stage in &self.stages {
            let time_str = stage
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());

            write!(
                f,
                "  {} {:<12} {:<18} {}",
                stage.status_char(),
                stage.stage.as_str(),
                stage.status.as_str(),
                time_str
            )?;

            if let Some(ref by) = stage.updated_by {
                write!(f, "  by {}", by)?;
            }
            if let Some(ref note) = stage.revision_note {
                write!(f, "  Note: {}", note)?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Versions: screen v{}, revit v{}, drawing v{}",
            self.versions.screen_version, self.versions.revit_version, self.versions.drawing_version
        )?;
        writeln!(f, "Progress: {:.0}%", self.progress_percent())?;

        if let Some(ref by) = self.locked_by {
            writeln!(f, "Status: Locked by {}", by)?;
        } else if self.is_complete() {
            writeln!(f, "Status: Complete")?;
        } else if !self.revision_stages().is_empty() {
            writeln!(
                f,
                "Status: Revision required ({} stage(s))",
                self.revision_stages().len()
            )?;
        } else if !self.review_stages().is_empty() {
            writeln!(
                f,
                "Status: Awaiting review ({} stage(s))",
                self.review_stages().len()
            )?;
        } else if let Some(current) = self.current_stage {
            writeln!(f, "Status: In progress at {}", current)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageName::*;

    fn status_of(statuses: &[(StageName, StageStatus)]) -> PipelineStatus {
        let ordering = StageOrdering::default();
        let mut ss = ShowSet::new("SS-07-01", "Hall B", "Finale", &ordering);
        for (stage, status) in statuses {
            ss.record_mut(*stage)
                .unwrap()
                .set_status(*status, "u-1", Utc::now());
        }
        PipelineStatus::from_show_set(&ss, &ordering)
    }

    #[test]
    fn test_pipeline_status_fresh() {
        let status = status_of(&[]);
        assert_eq!(status.stages.len(), 5);
        assert!(!status.is_complete());
        assert_eq!(status.current_stage, Some(Screen));
        assert_eq!(status.progress_percent(), 0.0);
    }

    #[test]
    fn test_pipeline_status_partial_complete() {
        let status = status_of(&[(Screen, StageStatus::Complete), (Structure, StageStatus::InProgress)]);
        assert_eq!(status.current_stage, Some(Structure));
        assert_eq!(status.running_stages(), vec![Structure]);
        assert_eq!(status.progress_percent(), 20.0);
    }

    #[test]
    fn test_pipeline_status_complete() {
        let all: Vec<_> = StageName::ALL
            .iter()
            .map(|s| (*s, StageStatus::Complete))
            .collect();
        let status = status_of(&all);
        assert!(status.is_complete());
        assert_eq!(status.current_stage, None);
        assert_eq!(status.progress_percent(), 100.0);
    }

    #[test]
    fn test_review_and_revision_stages() {
        let status = status_of(&[
            (Integrated, StageStatus::EngineerReview),
            (InBim360, StageStatus::ClientReview),
            (Drawing2d, StageStatus::RevisionRequired),
        ]);
        assert_eq!(status.review_stages(), vec![Integrated, InBim360]);
        assert_eq!(status.revision_stages(), vec![Drawing2d]);
    }

    #[test]
    fn test_legacy_ordering_has_four_entries() {
        let ordering = StageOrdering::new(crate::OrderingVariant::LegacyFourStage);
        let ss = ShowSet::new("SS-1", "A", "S", &ordering);
        let status = PipelineStatus::from_show_set(&ss, &ordering);
        assert_eq!(status.stages.len(), 4);
        assert!(status.stages.iter().all(|s| s.stage != Integrated));
    }

    #[test]
    fn test_pipeline_status_display() {
        let status = status_of(&[(Screen, StageStatus::Complete), (Structure, StageStatus::InProgress)]);
        let display = format!("{}", status);
        assert!(display.contains("SS-07-01"));
        assert!(display.contains("screen"));
        assert!(display.contains("inBim360"));
        assert!(display.contains("revit v1"));
        assert!(display.contains("In progress at structure"));
    }

    #[test]
    fn test_display_locked() {
        let mut status = status_of(&[]);
        status.locked_by = Some("admin-1".to_string());
        assert!(status.is_locked());
        assert!(format!("{}", status).contains("Locked by admin-1"));
    }

    #[test]
    fn test_stage_status_chars() {
        assert_eq!(StageStatusEntry::not_started(Screen).status_char(), '⏳');
        let mut entry = StageStatusEntry::not_started(Screen);
        entry.status = StageStatus::Complete;
        assert_eq!(entry.status_char(), '✅');
        entry.status = StageStatus::RevisionRequired;
        assert_eq!(entry.status_char(), '🔁');
    }
}
