//! Stage types for the ShowSet workflow engine.
//!
//! This module defines the fixed set of pipeline stages, the statuses a stage
//! can hold, and the per-stage record stored on every ShowSet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed pipeline stages.
///
/// The declaration order is the canonical five-stage ordering; `Ord` follows
/// it so stage maps iterate in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageName {
    /// Screen layout.
    Screen,
    /// Structural model.
    Structure,
    /// Integrated model (shares the Revit version with `Structure`).
    Integrated,
    /// Publication to BIM 360.
    #[serde(rename = "inBim360")]
    InBim360,
    /// 2D drawing set.
    #[serde(rename = "drawing2d")]
    Drawing2d,
}

impl StageName {
    /// All stages in canonical order.
    pub const ALL: [StageName; 5] = [
        StageName::Screen,
        StageName::Structure,
        StageName::Integrated,
        StageName::InBim360,
        StageName::Drawing2d,
    ];

    /// Returns the wire name of this stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Structure => "structure",
            Self::Integrated => "integrated",
            Self::InBim360 => "inBim360",
            Self::Drawing2d => "drawing2d",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// No work has begun.
    NotStarted,
    /// A worker is actively on the stage.
    InProgress,
    /// Awaiting approval by an engineer.
    EngineerReview,
    /// Awaiting approval by the customer.
    ClientReview,
    /// Sent back for rework; carries a revision note.
    RevisionRequired,
    /// Finished and approved.
    Complete,
    /// Parked by an administrator.
    OnHold,
}

impl StageStatus {
    /// All statuses.
    pub const ALL: [StageStatus; 7] = [
        StageStatus::NotStarted,
        StageStatus::InProgress,
        StageStatus::EngineerReview,
        StageStatus::ClientReview,
        StageStatus::RevisionRequired,
        StageStatus::Complete,
        StageStatus::OnHold,
    ];

    /// Returns the wire name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::EngineerReview => "engineer_review",
            Self::ClientReview => "client_review",
            Self::RevisionRequired => "revision_required",
            Self::Complete => "complete",
            Self::OnHold => "on_hold",
        }
    }

    /// Returns true for `engineer_review` and `client_review`.
    pub fn is_review(self) -> bool {
        matches!(self, Self::EngineerReview | Self::ClientReview)
    }

    /// Returns true for statuses a worker finishes from.
    pub fn is_work(self) -> bool {
        matches!(self, Self::InProgress | Self::RevisionRequired)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note explaining why a stage needs rework.
///
/// Note text is stored as given; translation and attachment storage are
/// handled elsewhere and referenced here only by language code and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionNote {
    /// The note text.
    pub text: String,
    /// Language code of `text`, if known.
    pub language: Option<String>,
    /// User who wrote the note.
    pub by: String,
    /// When the note was written.
    pub at: DateTime<Utc>,
    /// Identifier of an attachment stored by the file pipeline.
    pub attachment: Option<String>,
}

/// Per-stage state held by a ShowSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Current status.
    pub status: StageStatus,
    /// Last user to change the status.
    pub updated_by: Option<String>,
    /// When the status last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// Present only while `status` is `revision_required`.
    pub revision_note: Option<RevisionNote>,
}

impl StageRecord {
    /// Creates a record in `not_started`.
    pub fn new() -> Self {
        Self {
            status: StageStatus::NotStarted,
            updated_by: None,
            updated_at: None,
            revision_note: None,
        }
    }

    /// Sets the status, stamping the mutator and time.
    ///
    /// Leaving `revision_required` clears the revision note.
    pub fn set_status(&mut self, status: StageStatus, by: &str, at: DateTime<Utc>) {
        self.status = status;
        self.updated_by = Some(by.to_string());
        self.updated_at = Some(at);
        if status != StageStatus::RevisionRequired {
            self.revision_note = None;
        }
    }

    /// Moves the stage to `revision_required` with an optional note.
    ///
    /// Returns false when the record already holds the same status and note,
    /// leaving it untouched.
    pub fn mark_revision_required(
        &mut self,
        note: Option<RevisionNote>,
        by: &str,
        at: DateTime<Utc>,
    ) -> bool {
        if self.status == StageStatus::RevisionRequired && same_note(&self.revision_note, &note) {
            return false;
        }
        self.set_status(StageStatus::RevisionRequired, by, at);
        self.revision_note = note;
        true
    }
}

impl Default for StageRecord {
    fn default() -> Self {
        Self::new()
    }
}

// Timestamps and authors are ignored so that a repeated request is a no-op.
fn same_note(current: &Option<RevisionNote>, next: &Option<RevisionNote>) -> bool {
    match (current, next) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.text == b.text && a.language == b.language && a.attachment == b.attachment
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(text: &str) -> RevisionNote {
        RevisionNote {
            text: text.to_string(),
            language: Some("en".to_string()),
            by: "u-1".to_string(),
            at: Utc::now(),
            attachment: None,
        }
    }

    #[test]
    fn test_stage_name_order_is_pipeline_order() {
        let mut shuffled = vec![
            StageName::Drawing2d,
            StageName::Screen,
            StageName::InBim360,
            StageName::Integrated,
            StageName::Structure,
        ];
        shuffled.sort();
        assert_eq!(shuffled, StageName::ALL.to_vec());
    }

    #[test]
    fn test_stage_name_serialize() {
        assert_eq!(
            serde_json::to_string(&StageName::InBim360).unwrap(),
            r#""inBim360""#
        );
        assert_eq!(
            serde_json::to_string(&StageName::Drawing2d).unwrap(),
            r#""drawing2d""#
        );
        let stage: StageName = serde_json::from_str(r#""structure""#).unwrap();
        assert_eq!(stage, StageName::Structure);
    }

    #[test]
    fn test_stage_name_display_matches_serde() {
        for stage in StageName::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::RevisionRequired).unwrap();
        assert_eq!(json, r#""revision_required""#);
        let status: StageStatus = serde_json::from_str(r#""engineer_review""#).unwrap();
        assert_eq!(status, StageStatus::EngineerReview);
    }

    #[test]
    fn test_review_and_work_predicates() {
        assert!(StageStatus::EngineerReview.is_review());
        assert!(StageStatus::ClientReview.is_review());
        assert!(!StageStatus::Complete.is_review());
        assert!(StageStatus::InProgress.is_work());
        assert!(StageStatus::RevisionRequired.is_work());
        assert!(!StageStatus::OnHold.is_work());
    }

    #[test]
    fn test_stage_record_new() {
        let record = StageRecord::new();
        assert_eq!(record.status, StageStatus::NotStarted);
        assert!(record.updated_by.is_none());
        assert!(record.updated_at.is_none());
        assert!(record.revision_note.is_none());
    }

    #[test]
    fn test_set_status_stamps_author_and_time() {
        let mut record = StageRecord::new();
        let at = Utc::now();
        record.set_status(StageStatus::InProgress, "u-7", at);
        assert_eq!(record.status, StageStatus::InProgress);
        assert_eq!(record.updated_by.as_deref(), Some("u-7"));
        assert_eq!(record.updated_at, Some(at));
    }

    #[test]
    fn test_leaving_revision_required_clears_note() {
        let mut record = StageRecord::new();
        record.mark_revision_required(Some(note("redo")), "u-1", Utc::now());
        assert!(record.revision_note.is_some());

        record.set_status(StageStatus::InProgress, "u-2", Utc::now());
        assert!(record.revision_note.is_none());
    }

    #[test]
    fn test_mark_revision_required_is_idempotent() {
        let mut record = StageRecord::new();
        assert!(record.mark_revision_required(Some(note("redo")), "u-1", Utc::now()));
        let before = record.clone();

        assert!(!record.mark_revision_required(Some(note("redo")), "u-9", Utc::now()));
        assert_eq!(record, before);

        assert!(record.mark_revision_required(Some(note("other")), "u-9", Utc::now()));
        assert_eq!(record.revision_note.unwrap().text, "other");
    }

    #[test]
    fn test_stage_record_deserialize() {
        let json = r#"{"status":"complete","updatedBy":"u-1","updatedAt":null,"revisionNote":null}"#;
        let record: StageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, StageStatus::Complete);
        assert_eq!(record.updated_by.as_deref(), Some("u-1"));
    }
}
