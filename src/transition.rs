//! Per-stage transition rules.
//!
//! Every stage is described by a single [`ReviewRoute`]: the review states a
//! finished stage passes through before it is complete. The legal status set
//! of a stage, the worker's "finish" routing and the reviewer's "approve"
//! routing are all derived from that one entry, so there is exactly one place
//! that says what a stage may hold.

use crate::{Result, StageName, StageStatus, StructureReview, WorkflowError};

/// The review states a stage passes through after its work is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewRoute {
    /// Finished work is complete immediately.
    Direct,
    /// Finished work waits for engineer approval.
    Engineer,
    /// Finished work waits for customer approval.
    Client,
    /// Engineer approval, then customer approval.
    EngineerThenClient,
}

impl ReviewRoute {
    /// Returns the review states in the order they are visited.
    pub fn steps(self) -> &'static [StageStatus] {
        match self {
            Self::Direct => &[],
            Self::Engineer => &[StageStatus::EngineerReview],
            Self::Client => &[StageStatus::ClientReview],
            Self::EngineerThenClient => &[StageStatus::EngineerReview, StageStatus::ClientReview],
        }
    }
}

/// Statuses every stage may hold regardless of its route.
const BASE_STATUSES: [StageStatus; 5] = [
    StageStatus::NotStarted,
    StageStatus::InProgress,
    StageStatus::RevisionRequired,
    StageStatus::Complete,
    StageStatus::OnHold,
];

/// Pure transition rules for a deployment variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageTransitionRule {
    structure_review: StructureReview,
}

impl StageTransitionRule {
    /// Creates the rules for the given structure review policy.
    pub fn new(structure_review: StructureReview) -> Self {
        Self { structure_review }
    }

    /// Returns the review route of a stage.
    pub fn route(&self, stage: StageName) -> ReviewRoute {
        match stage {
            StageName::Screen => ReviewRoute::Direct,
            StageName::Structure => match self.structure_review {
                StructureReview::Direct => ReviewRoute::Direct,
                StructureReview::EngineerReview => ReviewRoute::Engineer,
            },
            StageName::Integrated => ReviewRoute::Engineer,
            StageName::InBim360 => ReviewRoute::Client,
            StageName::Drawing2d => ReviewRoute::EngineerThenClient,
        }
    }

    /// Returns every status the stage may ever hold.
    pub fn legal_statuses(&self, stage: StageName) -> Vec<StageStatus> {
        let steps = self.route(stage).steps();
        StageStatus::ALL
            .into_iter()
            .filter(|status| BASE_STATUSES.contains(status) || steps.contains(status))
            .collect()
    }

    /// Returns true if the stage may hold the status.
    pub fn is_legal(&self, stage: StageName, status: StageStatus) -> bool {
        BASE_STATUSES.contains(&status) || self.route(stage).steps().contains(&status)
    }

    /// Computes the status a worker's "finish" moves the stage to.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless the stage is in
    /// `in_progress` or `revision_required`.
    pub fn finish_target(
        &self,
        stage: StageName,
        current: StageStatus,
        mark_complete: bool,
    ) -> Result<StageStatus> {
        if !current.is_work() {
            return Err(WorkflowError::invalid_transition(
                stage,
                format!("cannot finish work from {}", current),
            ));
        }
        if !mark_complete {
            return Ok(StageStatus::InProgress);
        }
        Ok(self
            .route(stage)
            .steps()
            .first()
            .copied()
            .unwrap_or(StageStatus::Complete))
    }

    /// Computes the status an approval moves a stage in review to.
    ///
    /// Each approval advances exactly one review step; the last step
    /// completes the stage.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] if `current` is not one of the
    /// stage's review steps.
    pub fn after_review(&self, stage: StageName, current: StageStatus) -> Result<StageStatus> {
        let steps = self.route(stage).steps();
        let position = steps.iter().position(|s| *s == current).ok_or_else(|| {
            WorkflowError::invalid_transition(stage, format!("{} is not a review step", current))
        })?;
        Ok(steps
            .get(position + 1)
            .copied()
            .unwrap_or(StageStatus::Complete))
    }

    /// Computes the status "start" moves a stage to.
    ///
    /// A `complete` stage may only be restarted while a downstream stage
    /// needs revision.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] when the stage cannot be started
    /// from `current`.
    pub fn start_target(
        &self,
        stage: StageName,
        current: StageStatus,
        downstream_needs_revision: bool,
    ) -> Result<StageStatus> {
        match current {
            StageStatus::NotStarted | StageStatus::RevisionRequired | StageStatus::OnHold => {
                Ok(StageStatus::InProgress)
            }
            StageStatus::Complete if downstream_needs_revision => Ok(StageStatus::InProgress),
            StageStatus::Complete => Err(WorkflowError::invalid_transition(
                stage,
                "stage is complete and nothing downstream needs revision",
            )),
            other => Err(WorkflowError::invalid_transition(
                stage,
                format!("cannot start from {}", other),
            )),
        }
    }
}
