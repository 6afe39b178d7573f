//! Deployment configuration for the workflow engine.
//!
//! Deployments differ in a few places where the domain itself is ambiguous:
//! whether the legacy four-stage ordering is in use, whether `structure`
//! passes through engineer review, and how much of the pipeline a BIM
//! coordinator may touch. These choices are explicit values injected into
//! [`WorkflowEngine`](crate::WorkflowEngine), never inferred from data.
//!
//! # Example
//!
//! ```
//! use showset_workflow::{WorkflowVariant, StructureReview};
//!
//! let variant = WorkflowVariant::from_toml_str(r#"
//!     ordering = "five_stage"
//!     structure_review = "engineer_review"
//!     bim_coordinator_scope = "all_stages"
//! "#)?;
//! assert_eq!(variant.structure_review, StructureReview::EngineerReview);
//! # Ok::<(), showset_workflow::WorkflowError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// Which stage ordering the deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingVariant {
    /// `screen < structure < integrated < inBim360 < drawing2d`.
    #[default]
    FiveStage,
    /// Older data without `integrated`.
    LegacyFourStage,
}

/// Whether `structure` passes through `engineer_review` before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureReview {
    /// Finishing `structure` completes it.
    #[default]
    Direct,
    /// Finishing `structure` sends it to `engineer_review`.
    EngineerReview,
}

/// Which stages a BIM coordinator may work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BimCoordinatorScope {
    /// Only `inBim360`.
    #[default]
    InBim360Only,
    /// Every stage in the ordering.
    AllStages,
}

/// The full set of per-deployment workflow choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowVariant {
    /// Stage ordering.
    pub ordering: OrderingVariant,
    /// Review policy for `structure`.
    pub structure_review: StructureReview,
    /// Stage access for `bim_coordinator`.
    pub bim_coordinator_scope: BimCoordinatorScope,
}

impl WorkflowVariant {
    /// Parses a variant from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidConfig`](crate::WorkflowError::InvalidConfig)
    /// on malformed TOML or unknown keys and values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it cannot be parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Sets the stage ordering.
    pub fn with_ordering(mut self, ordering: OrderingVariant) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the structure review policy.
    pub fn with_structure_review(mut self, structure_review: StructureReview) -> Self {
        self.structure_review = structure_review;
        self
    }

    /// Sets the BIM coordinator scope.
    pub fn with_bim_coordinator_scope(mut self, scope: BimCoordinatorScope) -> Self {
        self.bim_coordinator_scope = scope;
        self
    }
}
