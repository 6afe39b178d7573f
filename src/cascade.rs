//! Cross-stage effects of a transition.
//!
//! Two directions are handled here:
//!
//! - **Downstream rejection**: a `complete` stage becomes workable again while
//!   a later stage that consumes its output is `revision_required`. This is a
//!   derived predicate and never changes stored status.
//! - **Upstream invalidation**: when work is sent back to an earlier stage,
//!   every stage after it up to the requesting stage, and every completed
//!   stage beyond that, is forced to `revision_required`.

use crate::{ShowSet, StageName, StageOrdering, StageStatus};

/// Resolves cascades against a ShowSet snapshot.
#[derive(Debug, Clone, Default)]
pub struct CascadeResolver {
    ordering: StageOrdering,
}

impl CascadeResolver {
    /// Creates a resolver for an ordering.
    pub fn new(ordering: StageOrdering) -> Self {
        Self { ordering }
    }

    /// Returns the later stages whose rejection reopens `stage`.
    pub fn revision_dependents(&self, stage: StageName) -> Vec<StageName> {
        use StageName::*;

        let dependents: &[StageName] = match stage {
            Screen => &[Structure, InBim360],
            Structure => &[InBim360, Drawing2d],
            Integrated => &[InBim360, Drawing2d],
            InBim360 => &[Drawing2d],
            Drawing2d => &[],
        };
        dependents
            .iter()
            .copied()
            .filter(|s| self.ordering.contains(*s))
            .collect()
    }

    /// Returns true if a later stage consuming `stage` needs revision.
    pub fn downstream_needs_revision(&self, show_set: &ShowSet, stage: StageName) -> bool {
        self.revision_dependents(stage)
            .into_iter()
            .any(|s| show_set.status(s) == Some(StageStatus::RevisionRequired))
    }

    /// Returns the stages invalidated when work moves back from `to` to `from`.
    ///
    /// That is every stage strictly after `from` up to and including `to`,
    /// followed by every `complete` stage after `to`. Applying the result
    /// twice changes nothing the second time.
    pub fn invalidated(&self, show_set: &ShowSet, from: StageName, to: StageName) -> Vec<StageName> {
        let mut stages = self.ordering.between(from, to);
        stages.extend(
            self.ordering
                .successors(to)
                .into_iter()
                .filter(|s| show_set.status(*s) == Some(StageStatus::Complete)),
        );
        stages
    }
}
