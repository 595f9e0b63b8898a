//! Per-worker DP table keyed by relation-subset bitmask
//!
//! `best(S) = min over valid right operands R of cost(Join(best(S \ R), best(R)))`.
//! In LINEAR mode `R` is a single relation `u` that may be joined last; in
//! BUSHY mode `R` is any admissible proper subset whose complement in `S` is
//! admissible too. Subsets must be offered in ascending size so that both
//! operands are final when `S` is processed.

use super::constraints::OrderConstraint;
use super::join_tree::{singleton, CandidatePlan, JoinTree, RelMask, RelationIndex};
use super::subset::Subset;
use crate::config::ShapeMode;
use crate::Result;
use std::collections::HashMap;
use tracing::trace;

/// Counters from one [`DPSearchTable::try_splits`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Candidates handed to the evaluator
    pub evaluated: usize,
    /// Candidates that replaced the cell's plan
    pub improved: usize,
    /// Candidates the evaluator refused or scored as non-finite
    pub refused: usize,
    /// Splits skipped because an operand had no plan
    pub skipped: usize,
}

/// Best known plan per relation subset
#[derive(Debug, Clone)]
pub struct DPSearchTable {
    levels_needed: usize,
    entries: HashMap<RelMask, CandidatePlan>,
}

impl DPSearchTable {
    /// Table with every singleton seeded as `Leaf(i)` at cost 0.
    pub fn new(levels_needed: usize) -> Self {
        let mut entries = HashMap::with_capacity(levels_needed * 4);
        for i in 0..levels_needed {
            entries.insert(singleton(i), CandidatePlan::new(JoinTree::leaf(i), 0.0));
        }
        Self {
            levels_needed,
            entries,
        }
    }

    pub fn levels_needed(&self) -> usize {
        self.levels_needed
    }

    pub fn best(&self, mask: RelMask) -> Option<&CandidatePlan> {
        self.entries.get(&mask)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return the plan for `mask`, consuming the table.
    pub fn into_plan(mut self, mask: RelMask) -> Option<CandidatePlan> {
        self.entries.remove(&mask)
    }

    /// Store `candidate` if the cell is empty or it is strictly cheaper.
    fn offer(&mut self, mask: RelMask, candidate: CandidatePlan) -> bool {
        match self.entries.get(&mask) {
            Some(current) if !candidate.is_cheaper_than(current) => false,
            _ => {
                self.entries.insert(mask, candidate);
                true
            }
        }
    }

    /// Try every legal split of `subset` and keep the cheapest.
    ///
    /// `evaluate` scores a candidate; an `Err` or a non-finite cost leaves the
    /// cell as it was.
    pub fn try_splits<F>(
        &mut self,
        subset: &Subset,
        constraints: &[OrderConstraint],
        shape_mode: ShapeMode,
        mut evaluate: F,
    ) -> SplitOutcome
    where
        F: FnMut(&JoinTree) -> Result<f64>,
    {
        let mut outcome = SplitOutcome::default();
        if subset.len() < 2 {
            return outcome;
        }

        let mask = subset.mask();
        for right in self.right_operands(subset, constraints, shape_mode) {
            let left = mask & !right;
            let candidate = match (self.entries.get(&left), self.entries.get(&right)) {
                (Some(l), Some(r)) => JoinTree::join(l.tree.clone(), r.tree.clone()),
                _ => {
                    outcome.skipped += 1;
                    continue;
                }
            };
            let tree = match candidate {
                Ok(tree) => tree,
                Err(_) => {
                    outcome.skipped += 1;
                    continue;
                }
            };

            outcome.evaluated += 1;
            match evaluate(&tree) {
                Ok(cost) if cost.is_finite() => {
                    if self.offer(mask, CandidatePlan::new(tree, cost)) {
                        outcome.improved += 1;
                    }
                }
                Ok(cost) => {
                    trace!(mask, cost, "non-finite cost treated as refusal");
                    outcome.refused += 1;
                }
                Err(e) => {
                    trace!(mask, error = %e, "evaluator refused candidate");
                    outcome.refused += 1;
                }
            }
        }
        outcome
    }

    fn right_operands(
        &self,
        subset: &Subset,
        constraints: &[OrderConstraint],
        shape_mode: ShapeMode,
    ) -> Vec<RelMask> {
        match shape_mode {
            ShapeMode::Linear => subset
                .members()
                .iter()
                .copied()
                .filter(|&u| is_valid_rightmost(u, subset, constraints))
                .map(singleton)
                .collect(),
            ShapeMode::Bushy => {
                let mask = subset.mask();
                let mut operands = Vec::new();
                let mut right = (mask - 1) & mask;
                while right != 0 {
                    if self.entries.contains_key(&right) && self.entries.contains_key(&(mask & !right)) {
                        operands.push(right);
                    }
                    right = (right - 1) & mask;
                }
                operands
            }
        }
    }
}

/// `u` may be joined last into `subset` unless a constraint `(u before w)`
/// has `w` in the subset too.
pub fn is_valid_rightmost(
    u: RelationIndex,
    subset: &Subset,
    constraints: &[OrderConstraint],
) -> bool {
    !constraints
        .iter()
        .any(|c| c.before == u && subset.contains(c.after))
}
