//! The transition orchestrator.
//!
//! [`WorkflowEngine`] composes the capability table, the per-stage rules,
//! the cascade resolver, the version policy and the lock guard behind one
//! entry point per action. It is a pure function over snapshots: it clones
//! the ShowSet it is given, applies the action to the clone and hands back
//! the clone together with the effects to persist. On error nothing is
//! returned and the input is untouched.
//!
//! Every action runs the same pipeline:
//!
//! 1. lock check (skipped by `lock`/`unlock`)
//! 2. capability check for the stage and target status
//! 3. next status from the stage rules
//! 4. cascades
//! 5. version effects
//!
//! An action that changes nothing returns the snapshot unchanged and no
//! effects, not even an activity entry.

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn};

use crate::status::PipelineStatus;
use crate::{
    Action, ActionKind, ActivityEntry, Actor, BimCoordinatorScope, CascadeResolver, ChangeCause,
    Effect, LockGuard, OrderingVariant, ReviewDecision, RevisionNote, Result, Role,
    RoleCapability, ShowSet, StageName, StageOrdering, StageStatus, StageTransitionRule,
    StructureReview, VersionGroup, VersionHistoryEntry, VersionPolicy, VersionReason,
    WorkflowError, WorkflowVariant, WorkingContext,
};

/// Who is acting, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionContext {
    /// The authenticated caller.
    pub actor: Actor,
    /// Timestamp stamped on every change.
    pub at: DateTime<Utc>,
    /// The caller's working session, used by `finishSession`.
    pub working: Option<WorkingContext>,
}

impl TransitionContext {
    /// Creates a context stamped with the current time.
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            at: Utc::now(),
            working: None,
        }
    }

    /// Overrides the timestamp.
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    /// Attaches a working session.
    pub fn with_working(mut self, working: WorkingContext) -> Self {
        self.working = Some(working);
        self
    }

    fn role(&self) -> Role {
        self.actor.role
    }
}

/// The result of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The new snapshot.
    pub show_set: ShowSet,
    /// Effects to persist with it, in order.
    pub effects: Vec<Effect>,
}

impl TransitionOutcome {
    /// Returns true if the action changed nothing.
    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }

    /// Returns the stages whose status changed, in effect order.
    pub fn changed_stages(&self) -> Vec<StageName> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::StageChanged { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    /// Returns the version history entries appended by the action.
    pub fn version_entries(&self) -> Vec<&VersionHistoryEntry> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::VersionRecorded { entry } => Some(entry),
                _ => None,
            })
            .collect()
    }
}

/// The working copy an action mutates.
struct Draft<'a> {
    show_set: ShowSet,
    ctx: &'a TransitionContext,
    effects: Vec<Effect>,
}

impl<'a> Draft<'a> {
    fn new(show_set: &ShowSet, ctx: &'a TransitionContext) -> Self {
        Self {
            show_set: show_set.clone(),
            ctx,
            effects: Vec::new(),
        }
    }

    fn status(&self, stage: StageName) -> Result<StageStatus> {
        self.show_set
            .status(stage)
            .ok_or(WorkflowError::StageNotInWorkflow(stage))
    }

    fn set(&mut self, stage: StageName, to: StageStatus, cause: ChangeCause) -> Result<()> {
        let ctx = self.ctx;
        let record = self
            .show_set
            .record_mut(stage)
            .ok_or(WorkflowError::StageNotInWorkflow(stage))?;
        let from = record.status;
        if from == to {
            return Ok(());
        }
        record.set_status(to, &ctx.actor.user_id, ctx.at);
        self.changed(stage, from, to, cause);
        Ok(())
    }

    fn revise(
        &mut self,
        stage: StageName,
        note: Option<RevisionNote>,
        cause: ChangeCause,
    ) -> Result<()> {
        let ctx = self.ctx;
        let record = self
            .show_set
            .record_mut(stage)
            .ok_or(WorkflowError::StageNotInWorkflow(stage))?;
        let from = record.status;
        if record.mark_revision_required(note, &ctx.actor.user_id, ctx.at) {
            self.changed(stage, from, StageStatus::RevisionRequired, cause);
        }
        Ok(())
    }

    fn changed(&mut self, stage: StageName, from: StageStatus, to: StageStatus, cause: ChangeCause) {
        if matches!(cause, ChangeCause::Cascade { .. }) {
            debug!(stage = %stage, from = %from, "cascaded to revision_required");
        }
        self.effects.push(Effect::StageChanged {
            stage,
            from,
            to,
            cause,
            by: self.ctx.actor.user_id.clone(),
            at: self.ctx.at,
        });
    }

    fn note(
        &self,
        text: &str,
        language: Option<&str>,
        attachment: Option<&str>,
    ) -> RevisionNote {
        RevisionNote {
            text: text.to_string(),
            language: language.map(str::to_string),
            by: self.ctx.actor.user_id.clone(),
            at: self.ctx.at,
            attachment: attachment.map(str::to_string),
        }
    }

    fn record_version(&mut self, entry: VersionHistoryEntry) {
        info!(group = %entry.version_type, version = entry.version, "version recorded");
        self.show_set.version_history.push(entry.clone());
        self.effects.push(Effect::VersionRecorded { entry });
    }

    fn into_outcome(mut self, kind: ActionKind, stage: Option<StageName>, summary: String) -> TransitionOutcome {
        if !self.effects.is_empty() {
            let entry = ActivityEntry {
                show_set_id: self.show_set.show_set_id.clone(),
                user_id: self.ctx.actor.user_id.clone(),
                role: self.ctx.actor.role,
                action: kind,
                stage,
                summary,
                at: self.ctx.at,
            };
            self.effects.push(Effect::Activity { entry });
        }
        TransitionOutcome {
            show_set: self.show_set,
            effects: self.effects,
        }
    }
}

fn required_note(stage: StageName, note: Option<&str>) -> Result<&str> {
    note.map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(WorkflowError::MissingRevisionNote(stage))
}

/// The stage transition engine for one deployment variant.
///
/// # Example
///
/// ```
/// use showset_workflow::{Actor, Role, StageName, StageStatus, TransitionContext, WorkflowEngine};
///
/// let engine = WorkflowEngine::builder().build();
/// let show_set = engine.new_show_set("SS-07-01", "Hall B", "Finale");
///
/// let ctx = TransitionContext::new(Actor::new("u-3d", Role::Modeller3d));
/// let outcome = engine.start(&show_set, &ctx, StageName::Screen, false)?;
/// assert_eq!(outcome.show_set.status(StageName::Screen), Some(StageStatus::InProgress));
/// # Ok::<(), showset_workflow::WorkflowError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    variant: WorkflowVariant,
    ordering: StageOrdering,
    capability: RoleCapability,
    rules: StageTransitionRule,
    cascade: CascadeResolver,
    versions: VersionPolicy,
    lock: LockGuard,
}

impl WorkflowEngine {
    /// Creates a new engine builder.
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new()
    }

    /// Creates an engine for a variant.
    pub fn new(variant: WorkflowVariant) -> Self {
        let ordering = StageOrdering::new(variant.ordering);
        Self {
            variant,
            capability: RoleCapability::new(&variant),
            rules: StageTransitionRule::new(variant.structure_review),
            cascade: CascadeResolver::new(ordering.clone()),
            ordering,
            versions: VersionPolicy,
            lock: LockGuard,
        }
    }

    /// Returns the variant this engine was built for.
    pub fn variant(&self) -> &WorkflowVariant {
        &self.variant
    }

    /// Returns the stage ordering.
    pub fn ordering(&self) -> &StageOrdering {
        &self.ordering
    }

    /// Returns the capability table.
    pub fn capability(&self) -> &RoleCapability {
        &self.capability
    }

    /// Returns the stage rules.
    pub fn rules(&self) -> &StageTransitionRule {
        &self.rules
    }

    /// Creates a fresh ShowSet with one `not_started` record per stage.
    pub fn new_show_set(
        &self,
        show_set_id: impl Into<String>,
        area: impl Into<String>,
        scene: impl Into<String>,
    ) -> ShowSet {
        ShowSet::new(show_set_id, area, scene, &self.ordering)
    }

    /// Returns the pipeline view of a ShowSet.
    pub fn status(&self, show_set: &ShowSet) -> PipelineStatus {
        PipelineStatus::from_show_set(show_set, &self.ordering)
    }

    /// Returns true if a completed stage may be reopened because later work
    /// that consumes it needs revision.
    pub fn downstream_needs_revision(&self, show_set: &ShowSet, stage: StageName) -> bool {
        self.cascade.downstream_needs_revision(show_set, stage)
    }

    /// Applies any action.
    pub fn apply_transition(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        action: &Action,
    ) -> Result<TransitionOutcome> {
        match action {
            Action::Start {
                stage,
                skip_version_increment,
            } => self.start(show_set, ctx, *stage, *skip_version_increment),
            Action::Finish {
                stage,
                mark_complete,
            } => self.finish(show_set, ctx, *stage, *mark_complete),
            Action::FinishSession { mark_complete } => {
                self.finish_session(show_set, ctx, *mark_complete)
            }
            Action::Approve {
                stage,
                decision,
                revision_note,
                revision_note_lang,
            } => self.approve(
                show_set,
                ctx,
                *stage,
                *decision,
                revision_note.as_deref(),
                revision_note_lang.as_deref(),
            ),
            Action::Recall {
                review_stage,
                target_stage,
                start_immediately,
            } => self.recall(show_set, ctx, *review_stage, *target_stage, *start_immediately),
            Action::RequestUpstreamRevision {
                target_stages,
                current_stage,
                revision_note,
                revision_note_lang,
                attachment,
            } => self.request_upstream_revision(
                show_set,
                ctx,
                target_stages,
                *current_stage,
                revision_note,
                revision_note_lang.as_deref(),
                attachment.as_deref(),
            ),
            Action::SetVersion {
                version_type,
                target_version,
                reason,
                language,
            } => self.set_version(show_set, ctx, *version_type, *target_version, reason, language),
            Action::SetStatus {
                stage,
                status,
                revision_note,
            } => self.set_status(show_set, ctx, *stage, *status, revision_note.as_deref()),
            Action::Lock => self.lock(show_set, ctx),
            Action::Unlock { stages_to_reset } => self.unlock(show_set, ctx, stages_to_reset),
        }
    }

    /// Begins or resumes work on a stage.
    ///
    /// Resuming after `revision_required` bumps the stage's version group
    /// unless `skip_version_increment` is set. A `complete` stage can only be
    /// restarted while downstream work needs revision, and that never bumps
    /// a version.
    pub fn start(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        stage: StageName,
        skip_version_increment: bool,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Start, Some(stage), |draft| {
            self.ordering.ensure(stage)?;
            self.capability
                .check(ctx.role(), stage, StageStatus::InProgress)?;

            let current = draft.status(stage)?;
            let downstream = self.cascade.downstream_needs_revision(&draft.show_set, stage);
            let target = self.rules.start_target(stage, current, downstream)?;

            if current == StageStatus::NotStarted {
                if let Some(blocking) = self
                    .ordering
                    .predecessors(stage)
                    .into_iter()
                    .find(|p| draft.show_set.status(*p) != Some(StageStatus::Complete))
                {
                    return Err(WorkflowError::invalid_transition(
                        stage,
                        format!("{} is not complete yet", blocking),
                    ));
                }
            }

            draft.set(stage, target, ChangeCause::Direct)?;
            if let Some(group) =
                self.versions
                    .auto_increment(stage, current, target, skip_version_increment)
            {
                self.bump(draft, stage, group)?;
            }
            Ok(format!("started {}", stage))
        })
    }

    /// Finishes a unit of work on a stage.
    ///
    /// For a worker this follows the stage's review route. For a role with
    /// authority over the stage's current review state it acts as an
    /// approval, or leaves the stage in review when `mark_complete` is false.
    pub fn finish(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        stage: StageName,
        mark_complete: bool,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Finish, Some(stage), |draft| {
            self.finish_stage(draft, stage, mark_complete)?;
            Ok(format!("finished {}", stage))
        })
    }

    /// Finishes every stage in the caller's working session.
    ///
    /// Stages the role does not own, or that cannot be finished from their
    /// current status, are skipped. Without a session this is a no-op.
    pub fn finish_session(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        mark_complete: bool,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::FinishSession, None, |draft| {
            let Some(working) = ctx.working.as_ref() else {
                debug!("no working session");
                return Ok(String::new());
            };
            if working.user_id != ctx.actor.user_id {
                warn!(session_user = %working.user_id, "working session belongs to another user");
                return Ok(String::new());
            }

            let mut finished = Vec::new();
            for stage in self.ordering.stages() {
                if !working.stages.contains(stage) {
                    continue;
                }
                if !self.is_finishable(&draft.show_set, ctx.role(), *stage, mark_complete) {
                    debug!(stage = %stage, "skipping stale session stage");
                    continue;
                }
                self.finish_stage(draft, *stage, mark_complete)?;
                finished.push(stage.as_str());
            }
            Ok(format!("finished session: {}", finished.join(", ")))
        })
    }

    /// Decides a review state.
    ///
    /// Approval advances one review step; rejection needs a non-blank note.
    pub fn approve(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        stage: StageName,
        decision: ReviewDecision,
        revision_note: Option<&str>,
        revision_note_lang: Option<&str>,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Approve, Some(stage), |draft| {
            self.ordering.ensure(stage)?;
            let role = ctx.role();
            self.capability.ensure_stage(role, stage)?;

            let current = draft.status(stage)?;
            if !current.is_review() {
                return Err(WorkflowError::invalid_transition(
                    stage,
                    format!("{} is not awaiting review", current),
                ));
            }
            self.capability.check(role, stage, decision.status())?;
            if !self.capability.can_review(role, current) {
                return Err(WorkflowError::NotReviewAuthority {
                    role,
                    stage,
                    status: current,
                });
            }

            match decision {
                ReviewDecision::Complete => {
                    let next = self.rules.after_review(stage, current)?;
                    draft.set(stage, next, ChangeCause::Direct)?;
                    Ok(format!("approved {} ({} -> {})", stage, current, next))
                }
                ReviewDecision::RevisionRequired => {
                    let text = required_note(stage, revision_note)?;
                    let note = draft.note(text, revision_note_lang, None);
                    draft.revise(stage, Some(note), ChangeCause::Direct)?;
                    Ok(format!("rejected {}: {}", stage, text))
                }
            }
        })
    }

    /// Pulls work out of review back to a stage at or before the review
    /// stage.
    ///
    /// The caller must be able to work on both the review stage and the
    /// target stage.
    ///
    /// Every stage after the target up to and including the review stage,
    /// and every completed stage after that, becomes `revision_required`.
    /// Recall never bumps a version.
    pub fn recall(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        review_stage: StageName,
        target_stage: StageName,
        start_immediately: bool,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Recall, Some(review_stage), |draft| {
            self.ordering.ensure(review_stage)?;
            self.ordering.ensure(target_stage)?;
            self.capability
                .check(ctx.role(), review_stage, StageStatus::InProgress)?;

            let current = draft.status(review_stage)?;
            if !current.is_review() {
                return Err(WorkflowError::invalid_transition(
                    review_stage,
                    format!("cannot recall from {}", current),
                ));
            }
            if target_stage != review_stage && !self.ordering.is_before(target_stage, review_stage)
            {
                return Err(WorkflowError::invalid_transition(
                    target_stage,
                    format!("recall target must not come after {}", review_stage),
                ));
            }
            if target_stage != review_stage {
                let target_status = if start_immediately {
                    StageStatus::InProgress
                } else {
                    StageStatus::RevisionRequired
                };
                self.capability
                    .check(ctx.role(), target_stage, target_status)?;
            }

            let invalidated = self
                .cascade
                .invalidated(&draft.show_set, target_stage, review_stage);
            if start_immediately {
                draft.set(target_stage, StageStatus::InProgress, ChangeCause::Direct)?;
            } else {
                draft.revise(target_stage, None, ChangeCause::Direct)?;
            }
            for stage in invalidated {
                draft.revise(
                    stage,
                    None,
                    ChangeCause::Cascade {
                        origin: target_stage,
                    },
                )?;
            }
            Ok(format!("recalled {} to {}", review_stage, target_stage))
        })
    }

    /// Sends earlier stages back for revision.
    ///
    /// Each target gets the note. Every stage after the earliest target up to
    /// and including `current_stage`, and every completed stage after it,
    /// is forced to `revision_required` as well. Applying the same request
    /// twice changes nothing the second time. Versions are never bumped here.
    #[allow(clippy::too_many_arguments)]
    pub fn request_upstream_revision(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        target_stages: &[StageName],
        current_stage: StageName,
        revision_note: &str,
        revision_note_lang: Option<&str>,
        attachment: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let kind = ActionKind::RequestUpstreamRevision;
        self.run(show_set, ctx, kind, Some(current_stage), |draft| {
            self.ordering.ensure(current_stage)?;
            for target in target_stages {
                self.ordering.ensure(*target)?;
            }
            self.capability
                .check(ctx.role(), current_stage, StageStatus::RevisionRequired)?;
            let text = required_note(current_stage, Some(revision_note))?;

            if draft.status(current_stage)? == StageStatus::NotStarted {
                return Err(WorkflowError::invalid_transition(
                    current_stage,
                    "work on this stage has not started",
                ));
            }
            let Some(origin) = self.ordering.earliest(target_stages) else {
                return Err(WorkflowError::invalid_transition(
                    current_stage,
                    "no target stages given",
                ));
            };
            for target in target_stages {
                if !self.ordering.is_before(*target, current_stage) {
                    return Err(WorkflowError::invalid_transition(
                        *target,
                        format!("only stages before {} can be sent back", current_stage),
                    ));
                }
                if draft.status(*target)? == StageStatus::NotStarted {
                    return Err(WorkflowError::invalid_transition(
                        *target,
                        "stage has not started",
                    ));
                }
            }

            let note = draft.note(text, revision_note_lang, attachment);
            let invalidated = self.cascade.invalidated(&draft.show_set, origin, current_stage);
            for stage in self.ordering.stages() {
                if target_stages.contains(stage) {
                    draft.revise(*stage, Some(note.clone()), ChangeCause::Direct)?;
                }
            }
            for stage in invalidated {
                if !target_stages.contains(&stage) {
                    draft.revise(stage, Some(note.clone()), ChangeCause::Cascade { origin })?;
                }
            }
            Ok(format!("requested revision of {} from {}", origin, current_stage))
        })
    }

    /// Records an explicit higher version for a group.
    ///
    /// Allowed for admins and for roles that work on a stage of the group.
    pub fn set_version(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        group: VersionGroup,
        target_version: u32,
        reason: &str,
        language: &str,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::SetVersion, None, |draft| {
            let role = ctx.role();
            let allowed = role.is_admin()
                || group
                    .stages()
                    .iter()
                    .any(|s| self.ordering.contains(*s) && self.capability.can_work_on(role, *s));
            if !allowed {
                return Err(WorkflowError::Forbidden {
                    role,
                    stage: group.lead_stage(),
                });
            }

            let reason = VersionReason::Manual {
                text: reason.to_string(),
                language: language.to_string(),
            };
            let entry = self.versions.set_version(
                &mut draft.show_set.versions,
                group,
                target_version,
                reason,
                &ctx.actor.user_id,
                ctx.at,
            )?;
            draft.record_version(entry);
            Ok(format!("set {} to {}", group, target_version))
        })
    }

    /// Admin override of a stage status.
    ///
    /// The status must be legal for the stage. No cascade runs and no
    /// version moves. A note is kept only for `revision_required`.
    pub fn set_status(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        stage: StageName,
        status: StageStatus,
        revision_note: Option<&str>,
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::SetStatus, Some(stage), |draft| {
            if !ctx.actor.role.is_admin() {
                return Err(WorkflowError::AdminOnly {
                    role: ctx.actor.role,
                    operation: "setStatus",
                });
            }
            self.ordering.ensure(stage)?;
            if !self.rules.is_legal(stage, status) {
                return Err(WorkflowError::invalid_transition(
                    stage,
                    format!("{} is not a status of this stage", status),
                ));
            }

            if status == StageStatus::RevisionRequired {
                let note = revision_note
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(|text| draft.note(text, None, None));
                draft.revise(stage, note, ChangeCause::Override)?;
            } else {
                draft.set(stage, status, ChangeCause::Override)?;
            }
            Ok(format!("set {} to {}", stage, status))
        })
    }

    /// Locks the ShowSet. Admin only.
    pub fn lock(&self, show_set: &ShowSet, ctx: &TransitionContext) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Lock, None, |draft| {
            self.lock.lock(&mut draft.show_set, &ctx.actor, ctx.at)?;
            draft.effects.push(Effect::Locked {
                by: ctx.actor.user_id.clone(),
                at: ctx.at,
            });
            Ok("locked".to_string())
        })
    }

    /// Unlocks the ShowSet, moving each listed complete stage to
    /// `revision_required`. Admin only.
    pub fn unlock(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        stages_to_reset: &[StageName],
    ) -> Result<TransitionOutcome> {
        self.run(show_set, ctx, ActionKind::Unlock, None, |draft| {
            let reset = self
                .lock
                .unlock(&mut draft.show_set, &self.ordering, stages_to_reset, &ctx.actor)?;
            draft.effects.push(Effect::Unlocked {
                by: ctx.actor.user_id.clone(),
                at: ctx.at,
                reset: reset.clone(),
            });
            for stage in &reset {
                draft.revise(*stage, None, ChangeCause::Unlock)?;
            }
            let names: Vec<&str> = reset.iter().map(|s| s.as_str()).collect();
            Ok(format!("unlocked, reset [{}]", names.join(", ")))
        })
    }

    fn run<F>(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        kind: ActionKind,
        stage: Option<StageName>,
        apply: F,
    ) -> Result<TransitionOutcome>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<String>,
    {
        let span = info_span!(
            "transition",
            show_set_id = %show_set.show_set_id,
            action = %kind,
            role = %ctx.actor.role,
        );
        let _entered = span.enter();

        let result = self.run_inner(show_set, ctx, kind, stage, apply);
        match &result {
            Ok(outcome) if outcome.is_noop() => debug!("transition changed nothing"),
            Ok(outcome) => info!(effects = outcome.effects.len(), "transition applied"),
            Err(e) if e.kind() == crate::ErrorKind::InvalidTransition => {
                debug!(code = %e.kind(), error = %e, "transition rejected")
            }
            Err(e) => warn!(code = %e.kind(), error = %e, "transition rejected"),
        }
        result
    }

    fn run_inner<F>(
        &self,
        show_set: &ShowSet,
        ctx: &TransitionContext,
        kind: ActionKind,
        stage: Option<StageName>,
        apply: F,
    ) -> Result<TransitionOutcome>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<String>,
    {
        if !kind.bypasses_lock() {
            self.lock.ensure_unlocked(show_set)?;
        }

        let mut draft = Draft::new(show_set, ctx);
        let summary = apply(&mut draft)?;

        for effect in &draft.effects {
            if let Effect::StageChanged { stage, to, .. } = effect {
                if !self.rules.is_legal(*stage, *to) {
                    return Err(WorkflowError::invalid_transition(
                        *stage,
                        format!("{} is not a status of this stage", to),
                    ));
                }
            }
        }
        Ok(draft.into_outcome(kind, stage, summary))
    }

    fn finish_stage(&self, draft: &mut Draft<'_>, stage: StageName, mark_complete: bool) -> Result<()> {
        self.ordering.ensure(stage)?;
        let role = draft.ctx.role();
        self.capability.ensure_stage(role, stage)?;
        let current = draft.status(stage)?;

        if current.is_review() && self.capability.can_review(role, current) {
            if !mark_complete {
                return Ok(());
            }
            self.capability.check(role, stage, StageStatus::Complete)?;
            let next = self.rules.after_review(stage, current)?;
            return draft.set(stage, next, ChangeCause::Direct);
        }

        let target = self.rules.finish_target(stage, current, mark_complete)?;
        self.capability.check(role, stage, target)?;
        draft.set(stage, target, ChangeCause::Direct)?;
        if let Some(group) = self.versions.auto_increment(stage, current, target, false) {
            self.bump(draft, stage, group)?;
        }
        Ok(())
    }

    fn is_finishable(&self, show_set: &ShowSet, role: Role, stage: StageName, mark_complete: bool) -> bool {
        let Some(current) = show_set.status(stage) else {
            return false;
        };
        if self.capability.ensure_stage(role, stage).is_err() {
            return false;
        }
        if current.is_review() && self.capability.can_review(role, current) {
            return self.capability.check(role, stage, StageStatus::Complete).is_ok();
        }
        self.rules
            .finish_target(stage, current, mark_complete)
            .map(|target| self.capability.check(role, stage, target).is_ok())
            .unwrap_or(false)
    }

    fn bump(&self, draft: &mut Draft<'_>, stage: StageName, group: VersionGroup) -> Result<()> {
        let entry = self.versions.increment(
            &mut draft.show_set.versions,
            group,
            VersionReason::Revision { stage },
            &draft.ctx.actor.user_id,
            draft.ctx.at,
        )?;
        draft.record_version(entry);
        Ok(())
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(WorkflowVariant::default())
    }
}

/// Builder for [`WorkflowEngine`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowEngineBuilder {
    variant: WorkflowVariant,
}

impl WorkflowEngineBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Uses a complete variant, replacing earlier settings.
    pub fn variant(mut self, variant: WorkflowVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Selects the stage ordering.
    pub fn ordering(mut self, ordering: OrderingVariant) -> Self {
        self.variant.ordering = ordering;
        self
    }

    /// Selects whether `structure` passes through engineer review.
    pub fn structure_review(mut self, structure_review: StructureReview) -> Self {
        self.variant.structure_review = structure_review;
        self
    }

    /// Selects the stages a BIM coordinator may work on.
    pub fn bim_coordinator_scope(mut self, scope: BimCoordinatorScope) -> Self {
        self.variant.bim_coordinator_scope = scope;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> WorkflowEngine {
        WorkflowEngine::new(self.variant)
    }
}
