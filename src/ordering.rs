//! Stage ordering backed by a petgraph DAG.
//!
//! Both supported orderings are linear chains, but questions like "which
//! stages come before this one" and "which stages lie between two stages" are
//! answered from the graph so the rest of the engine never hard-codes
//! positions.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::{OrderingVariant, Result, StageName, WorkflowError};

/// The ordered set of stages a deployment runs.
#[derive(Debug, Clone)]
pub struct StageOrdering {
    variant: OrderingVariant,
    /// Edges point from a stage to the stage that follows it.
    graph: DiGraph<StageName, ()>,
    index: HashMap<StageName, NodeIndex>,
    order: Vec<StageName>,
}

impl StageOrdering {
    /// Builds the ordering for a variant.
    pub fn new(variant: OrderingVariant) -> Self {
        let order: Vec<StageName> = match variant {
            OrderingVariant::FiveStage => StageName::ALL.to_vec(),
            OrderingVariant::LegacyFourStage => StageName::ALL
                .into_iter()
                .filter(|stage| *stage != StageName::Integrated)
                .collect(),
        };

        let mut graph = DiGraph::new();
        let mut index = HashMap::with_capacity(order.len());
        for stage in &order {
            index.insert(*stage, graph.add_node(*stage));
        }
        for pair in order.windows(2) {
            graph.add_edge(index[&pair[0]], index[&pair[1]], ());
        }

        Self {
            variant,
            graph,
            index,
            order,
        }
    }

    /// Returns the variant this ordering was built from.
    pub fn variant(&self) -> OrderingVariant {
        self.variant
    }

    /// Returns the stages in pipeline order.
    pub fn stages(&self) -> &[StageName] {
        &self.order
    }

    /// Returns true if the stage is part of this ordering.
    pub fn contains(&self, stage: StageName) -> bool {
        self.index.contains_key(&stage)
    }

    /// Fails with [`WorkflowError::StageNotInWorkflow`] for foreign stages.
    pub fn ensure(&self, stage: StageName) -> Result<()> {
        if self.contains(stage) {
            Ok(())
        } else {
            Err(WorkflowError::StageNotInWorkflow(stage))
        }
    }

    /// Returns the zero-based position of a stage.
    pub fn position(&self, stage: StageName) -> Option<usize> {
        self.order.iter().position(|s| *s == stage)
    }

    /// Returns true if `a` comes strictly before `b`.
    pub fn is_before(&self, a: StageName, b: StageName) -> bool {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&ia), Some(&ib)) if ia != ib => has_path_connecting(&self.graph, ia, ib, None),
            _ => false,
        }
    }

    /// Returns every stage before `stage`, in order.
    pub fn predecessors(&self, stage: StageName) -> Vec<StageName> {
        self.order
            .iter()
            .copied()
            .filter(|s| self.is_before(*s, stage))
            .collect()
    }

    /// Returns every stage after `stage`, in order.
    pub fn successors(&self, stage: StageName) -> Vec<StageName> {
        self.order
            .iter()
            .copied()
            .filter(|s| self.is_before(stage, *s))
            .collect()
    }

    /// Returns the stages strictly after `from` up to and including `to`.
    ///
    /// Empty when `to` is not after `from`.
    pub fn between(&self, from: StageName, to: StageName) -> Vec<StageName> {
        self.order
            .iter()
            .copied()
            .filter(|s| self.is_before(from, *s) && (*s == to || self.is_before(*s, to)))
            .collect()
    }

    /// Returns the earliest of the given stages, ignoring foreign ones.
    pub fn earliest(&self, stages: &[StageName]) -> Option<StageName> {
        stages
            .iter()
            .copied()
            .filter(|s| self.contains(*s))
            .min_by_key(|s| self.position(*s))
    }
}

impl Default for StageOrdering {
    fn default() -> Self {
        Self::new(OrderingVariant::FiveStage)
    }
}
