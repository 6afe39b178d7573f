//! Administrative lock.
//!
//! A locked ShowSet rejects every transition with `LOCKED`, for every role,
//! until an admin unlocks it. Unlocking is also the only way to selectively
//! reopen finished work on a frozen item.

use chrono::{DateTime, Utc};

use crate::{Actor, Result, ShowSet, StageName, StageOrdering, StageStatus, WorkflowError};

/// Enforces and changes the lock state of a ShowSet.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockGuard;

impl LockGuard {
    /// Fails with [`WorkflowError::Locked`] while the ShowSet is locked.
    pub fn ensure_unlocked(&self, show_set: &ShowSet) -> Result<()> {
        if show_set.is_locked() {
            return Err(WorkflowError::Locked(show_set.show_set_id.clone()));
        }
        Ok(())
    }

    /// Locks the ShowSet.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::AdminOnly`] for non-admins,
    /// [`WorkflowError::AlreadyLocked`] if a lock is already present.
    pub fn lock(&self, show_set: &mut ShowSet, actor: &Actor, at: DateTime<Utc>) -> Result<()> {
        ensure_admin(actor, "lock")?;
        if show_set.is_locked() {
            return Err(WorkflowError::AlreadyLocked(show_set.show_set_id.clone()));
        }
        show_set.locked_at = Some(at);
        show_set.locked_by = Some(actor.user_id.clone());
        Ok(())
    }

    /// Clears the lock and returns the stages that must be reset.
    ///
    /// The returned stages are deduplicated and in pipeline order; the caller
    /// moves each of them to `revision_required`. Stages not listed keep
    /// their status.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::AdminOnly`] for non-admins, [`WorkflowError::NotLocked`]
    /// without a lock, and [`WorkflowError::InvalidTransition`] if a listed
    /// stage is not `complete`.
    pub fn unlock(
        &self,
        show_set: &mut ShowSet,
        ordering: &StageOrdering,
        stages_to_reset: &[StageName],
        actor: &Actor,
    ) -> Result<Vec<StageName>> {
        ensure_admin(actor, "unlock")?;
        if !show_set.is_locked() {
            return Err(WorkflowError::NotLocked(show_set.show_set_id.clone()));
        }

        let mut reset = Vec::with_capacity(stages_to_reset.len());
        for stage in ordering.stages() {
            if !stages_to_reset.contains(stage) {
                continue;
            }
            if show_set.status(*stage) != Some(StageStatus::Complete) {
                return Err(WorkflowError::invalid_transition(
                    *stage,
                    "only complete stages can be reset on unlock",
                ));
            }
            reset.push(*stage);
        }
        if let Some(foreign) = stages_to_reset.iter().find(|s| !ordering.contains(**s)) {
            return Err(WorkflowError::StageNotInWorkflow(*foreign));
        }

        show_set.locked_at = None;
        show_set.locked_by = None;
        Ok(reset)
    }
}

fn ensure_admin(actor: &Actor, operation: &'static str) -> Result<()> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::AdminOnly {
            role: actor.role,
            operation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Role};

    fn admin() -> Actor {
        Actor::new("admin-1", Role::Admin)
    }

    fn show_set() -> ShowSet {
        ShowSet::new("SS-1", "A", "S", &StageOrdering::default())
    }

    #[test]
    fn test_lock_sets_fields() {
        let mut ss = show_set();
        let at = Utc::now();
        LockGuard.lock(&mut ss, &admin(), at).unwrap();
        assert_eq!(ss.locked_at, Some(at));
        assert_eq!(ss.locked_by.as_deref(), Some("admin-1"));
        assert_eq!(LockGuard.ensure_unlocked(&ss).unwrap_err().kind(), ErrorKind::Locked);
    }

    #[test]
    fn test_lock_twice_fails() {
        let mut ss = show_set();
        LockGuard.lock(&mut ss, &admin(), Utc::now()).unwrap();
        let err = LockGuard.lock(&mut ss, &admin(), Utc::now()).unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyLocked(_)));
    }

    #[test]
    fn test_non_admin_cannot_lock_or_unlock() {
        let mut ss = show_set();
        let coordinator = Actor::new("u-2", Role::BimCoordinator);
        let err = LockGuard.lock(&mut ss, &coordinator, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        LockGuard.lock(&mut ss, &admin(), Utc::now()).unwrap();
        let err = LockGuard
            .unlock(&mut ss, &StageOrdering::default(), &[], &coordinator)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(ss.is_locked());
    }

    #[test]
    fn test_unlock_requires_lock() {
        let mut ss = show_set();
        let err = LockGuard
            .unlock(&mut ss, &StageOrdering::default(), &[], &admin())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotLocked(_)));
    }

    #[test]
    fn test_unlock_returns_stages_in_order() {
        let mut ss = show_set();
        for stage in [StageName::Screen, StageName::InBim360] {
            ss.record_mut(stage)
                .unwrap()
                .set_status(StageStatus::Complete, "u-1", Utc::now());
        }
        LockGuard.lock(&mut ss, &admin(), Utc::now()).unwrap();

        let reset = LockGuard
            .unlock(
                &mut ss,
                &StageOrdering::default(),
                &[StageName::InBim360, StageName::Screen, StageName::InBim360],
                &admin(),
            )
            .unwrap();
        assert_eq!(reset, vec![StageName::Screen, StageName::InBim360]);
        assert!(!ss.is_locked());
        assert!(ss.locked_by.is_none());
    }

    #[test]
    fn test_unlock_rejects_incomplete_stage_and_keeps_lock() {
        let mut ss = show_set();
        LockGuard.lock(&mut ss, &admin(), Utc::now()).unwrap();
        let err = LockGuard
            .unlock(&mut ss, &StageOrdering::default(), &[StageName::Structure], &admin())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(ss.is_locked());
    }
}
