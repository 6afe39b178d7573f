//! Roles and the capability table.
//!
//! Each role maps to one [`RoleGrant`] row: which stages it may touch and
//! which statuses it may set there. All permission questions in the crate
//! are answered from that row, so adding a role means adding one entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{
    BimCoordinatorScope, Result, StageName, StageOrdering, StageStatus, StageTransitionRule,
    WorkflowError, WorkflowVariant,
};

/// A caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including lock/unlock and direct status overrides.
    Admin,
    /// Coordinates BIM publication.
    BimCoordinator,
    /// Approves or rejects engineer reviews. `reviewer` is a legacy alias.
    #[serde(alias = "reviewer")]
    Engineer,
    /// Builds the 3D models.
    #[serde(rename = "3d_modeller")]
    Modeller3d,
    /// Produces the 2D drawings.
    #[serde(rename = "2d_drafter")]
    Drafter2d,
    /// Approves or rejects client reviews.
    CustomerReviewer,
    /// Read-only.
    ViewOnly,
}

impl Role {
    /// All roles.
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::BimCoordinator,
        Role::Engineer,
        Role::Modeller3d,
        Role::Drafter2d,
        Role::CustomerReviewer,
        Role::ViewOnly,
    ];

    /// Returns the wire name of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::BimCoordinator => "bim_coordinator",
            Self::Engineer => "engineer",
            Self::Modeller3d => "3d_modeller",
            Self::Drafter2d => "2d_drafter",
            Self::CustomerReviewer => "customer_reviewer",
            Self::ViewOnly => "view_only",
        }
    }

    /// Returns true for `admin`.
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller, as resolved by the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// The caller's user id.
    pub user_id: String,
    /// The caller's role.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Which stages a grant covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageScope {
    /// Every stage in the ordering.
    All,
    /// A fixed list.
    Only(&'static [StageName]),
    /// Every stage whose legal statuses include this review state.
    Reviewing(StageStatus),
    /// No stage.
    Nothing,
}

/// Which statuses a grant covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusScope {
    /// Every legal status.
    All,
    /// Statuses that start, advance or hand back work.
    Work,
    /// `complete` and `revision_required` only.
    Approval,
}

const WORK_STATUSES: [StageStatus; 5] = [
    StageStatus::InProgress,
    StageStatus::EngineerReview,
    StageStatus::ClientReview,
    StageStatus::RevisionRequired,
    StageStatus::Complete,
];

const APPROVAL_STATUSES: [StageStatus; 2] = [StageStatus::RevisionRequired, StageStatus::Complete];

/// One row of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGrant {
    /// Stage access.
    pub stages: StageScope,
    /// Status access on those stages.
    pub statuses: StatusScope,
}

/// Capability lookups for a deployment variant.
#[derive(Debug, Clone)]
pub struct RoleCapability {
    ordering: StageOrdering,
    rules: StageTransitionRule,
    bim_coordinator_scope: BimCoordinatorScope,
}

impl RoleCapability {
    /// Creates the capability table for a variant.
    pub fn new(variant: &WorkflowVariant) -> Self {
        Self {
            ordering: StageOrdering::new(variant.ordering),
            rules: StageTransitionRule::new(variant.structure_review),
            bim_coordinator_scope: variant.bim_coordinator_scope,
        }
    }

    /// Returns the capability table row for a role.
    pub fn grant(&self, role: Role) -> RoleGrant {
        use StageName::*;

        let (stages, statuses) = match role {
            Role::Admin => (StageScope::All, StatusScope::All),
            Role::BimCoordinator => match self.bim_coordinator_scope {
                BimCoordinatorScope::InBim360Only => (StageScope::Only(&[InBim360]), StatusScope::Work),
                BimCoordinatorScope::AllStages => (StageScope::All, StatusScope::Work),
            },
            Role::Modeller3d => (
                StageScope::Only(&[Screen, Structure, Integrated]),
                StatusScope::Work,
            ),
            Role::Drafter2d => (StageScope::Only(&[Drawing2d]), StatusScope::Work),
            Role::Engineer => (
                StageScope::Reviewing(StageStatus::EngineerReview),
                StatusScope::Approval,
            ),
            Role::CustomerReviewer => (
                StageScope::Reviewing(StageStatus::ClientReview),
                StatusScope::Approval,
            ),
            Role::ViewOnly => (StageScope::Nothing, StatusScope::Work),
        };
        RoleGrant { stages, statuses }
    }

    /// Returns the stages a role may touch.
    pub fn stages_for(&self, role: Role) -> BTreeSet<StageName> {
        let grant = self.grant(role);
        self.ordering
            .stages()
            .iter()
            .copied()
            .filter(|stage| match grant.stages {
                StageScope::All => true,
                StageScope::Only(list) => list.contains(stage),
                StageScope::Reviewing(status) => self.rules.is_legal(*stage, status),
                StageScope::Nothing => false,
            })
            .collect()
    }

    /// Returns the statuses a role may set on a stage, in canonical order.
    ///
    /// Empty when the role does not own the stage.
    pub fn allowed_statuses(&self, role: Role, stage: StageName) -> Vec<StageStatus> {
        if !self.stages_for(role).contains(&stage) {
            return Vec::new();
        }
        let scope = self.grant(role).statuses;
        self.rules
            .legal_statuses(stage)
            .into_iter()
            .filter(|status| match scope {
                StatusScope::All => true,
                StatusScope::Work => WORK_STATUSES.contains(status),
                StatusScope::Approval => APPROVAL_STATUSES.contains(status),
            })
            .collect()
    }

    /// Checks that a role may set a stage to a status.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Forbidden`] when the role lacks the stage,
    /// [`WorkflowError::InvalidStatusForRole`] when it owns the stage but not
    /// the status.
    pub fn check(&self, role: Role, stage: StageName, status: StageStatus) -> Result<()> {
        self.ensure_stage(role, stage)?;
        if !self.allowed_statuses(role, stage).contains(&status) {
            return Err(WorkflowError::InvalidStatusForRole {
                role,
                stage,
                status,
            });
        }
        Ok(())
    }

    /// Fails with [`WorkflowError::Forbidden`] unless the role has the stage.
    pub fn ensure_stage(&self, role: Role, stage: StageName) -> Result<()> {
        if self.stages_for(role).contains(&stage) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden { role, stage })
        }
    }

    /// Returns true if the role only approves or rejects.
    pub fn is_approval_only(&self, role: Role) -> bool {
        self.grant(role).statuses == StatusScope::Approval
    }

    /// Returns true if the role may perform work on the stage.
    pub fn can_work_on(&self, role: Role, stage: StageName) -> bool {
        self.allowed_statuses(role, stage)
            .contains(&StageStatus::InProgress)
    }

    /// Returns true if the role may decide the given review state.
    pub fn can_review(&self, role: Role, review: StageStatus) -> bool {
        match role {
            Role::Admin => review.is_review(),
            _ => self.grant(role).stages == StageScope::Reviewing(review),
        }
    }
}

impl Default for RoleCapability {
    fn default() -> Self {
        Self::new(&WorkflowVariant::default())
    }
}
