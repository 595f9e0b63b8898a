//! One worker's share of the search
//!
//! A [`WorkerTask`] derives its partition constraints, enumerates the
//! admissible subsets, fills a private DP table bottom-up, and hands back the
//! plan for the full relation set. The table and subset lists are dropped
//! when the task returns.

use super::admissible::AdmissibleSetEnumerator;
use super::collaborators::CostEvaluator;
use super::constraints::ConstraintGenerator;
use super::context::SharedSearchView;
use super::dp_table::{DPSearchTable, SplitOutcome};
use super::join_tree::{full_mask, CandidatePlan};
use crate::{Error, Result};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-worker search counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerStats {
    pub admissible_subsets: usize,
    pub candidates_evaluated: usize,
    pub improvements: usize,
    pub refusals: usize,
    pub skipped_splits: usize,
    pub elapsed: Duration,
}

impl WorkerStats {
    fn record(&mut self, outcome: SplitOutcome) {
        self.candidates_evaluated += outcome.evaluated;
        self.improvements += outcome.improved;
        self.refusals += outcome.refused;
        self.skipped_splits += outcome.skipped;
    }
}

/// Local optimum of one partition
#[derive(Debug, Clone, Serialize)]
pub struct WorkerResult {
    pub part_id: usize,
    /// `None` when the partition produced no plan for the full set
    pub plan: Option<CandidatePlan>,
    pub stats: WorkerStats,
}

impl WorkerResult {
    pub fn cost(&self) -> Option<f64> {
        self.plan.as_ref().map(|p| p.cost)
    }

    /// The local optimum, or [`Error::NoAdmissiblePlan`].
    pub fn local_optimum(&self) -> Result<&CandidatePlan> {
        self.plan.as_ref().ok_or(Error::NoAdmissiblePlan {
            part_id: self.part_id,
        })
    }
}

/// Binds a partition id to the shared view
pub struct WorkerTask<'v, 'a, E: ?Sized> {
    part_id: usize,
    view: &'v SharedSearchView<'a, E>,
}

impl<'v, 'a, E: CostEvaluator + ?Sized> WorkerTask<'v, 'a, E> {
    pub fn new(part_id: usize, view: &'v SharedSearchView<'a, E>) -> Self {
        Self { part_id, view }
    }

    pub fn run(self) -> WorkerResult {
        let start = Instant::now();
        let levels = self.view.levels_needed();
        let shape_mode = self.view.shape_mode();
        let target = full_mask(levels);
        let mut stats = WorkerStats::default();

        let constraints =
            ConstraintGenerator::new(levels, self.view.n_workers(), shape_mode).generate(self.part_id);
        let admissible = AdmissibleSetEnumerator::new(levels, shape_mode).enumerate(&constraints);
        stats.admissible_subsets = admissible.len();

        // Largest subsets sort last; if the full set is not among them no
        // amount of splitting reaches it.
        if admissible.last().map(|s| s.mask()) != Some(target) {
            warn!(part_id = self.part_id, "full relation set is not admissible");
            stats.elapsed = start.elapsed();
            return WorkerResult {
                part_id: self.part_id,
                plan: None,
                stats,
            };
        }

        let mut table = DPSearchTable::new(levels);
        for subset in admissible.iter().filter(|s| s.len() > 1) {
            let outcome =
                table.try_splits(subset, &constraints, shape_mode, |tree| self.view.evaluate(tree));
            stats.record(outcome);
        }

        let plan = table.into_plan(target);
        stats.elapsed = start.elapsed();

        match &plan {
            Some(p) => debug!(
                part_id = self.part_id,
                cost = p.cost,
                subsets = stats.admissible_subsets,
                evaluated = stats.candidates_evaluated,
                refused = stats.refusals,
                elapsed_us = stats.elapsed.as_micros() as u64,
                "worker found local optimum"
            ),
            None => warn!(
                part_id = self.part_id,
                refused = stats.refusals,
                "no admissible plan for full relation set"
            ),
        }

        WorkerResult {
            part_id: self.part_id,
            plan,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchConfig, ShapeMode};
    use crate::join_search::join_tree::JoinTree;

    fn root_size_cost(tree: &JoinTree) -> Result<f64> {
        match tree {
            JoinTree::Leaf { .. } => Ok(0.0),
            JoinTree::Join { left, right, .. } => Ok((left.size() + right.size()) as f64),
        }
    }

    #[test]
    fn test_worker_zero_respects_pair_orientation() {
        let config = SearchConfig::new(3, 2, ShapeMode::Linear);
        let view = SharedSearchView::new(&config, &root_size_cost);
        let result = WorkerTask::new(0, &view).run();
        let plan = result.local_optimum().unwrap();
        assert_eq!(plan.cost, 3.0);
        let order = plan.tree.leaf_order();
        let a = order.iter().position(|&r| r == 0).unwrap();
        let b = order.iter().position(|&r| r == 1).unwrap();
        assert!(a < b, "relation 0 must precede 1 in {:?}", order);
        assert!(plan.tree.is_left_deep());
        assert_eq!(result.stats.admissible_subsets, 5);
    }

    #[test]
    fn test_worker_one_swaps_orientation() {
        let config = SearchConfig::new(3, 2, ShapeMode::Linear);
        let view = SharedSearchView::new(&config, &root_size_cost);
        let result = WorkerTask::new(1, &view).run();
        let order = result.local_optimum().unwrap().tree.leaf_order();
        let a = order.iter().position(|&r| r == 0).unwrap();
        let b = order.iter().position(|&r| r == 1).unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_single_relation() {
        for mode in [ShapeMode::Linear, ShapeMode::Bushy] {
            let config = SearchConfig::new(1, 4, mode);
            let view = SharedSearchView::new(&config, &root_size_cost);
            let result = WorkerTask::new(3, &view).run();
            let plan = result.local_optimum().unwrap();
            assert_eq!(plan.tree, JoinTree::leaf(0));
            assert_eq!(plan.cost, 0.0);
            assert_eq!(result.stats.candidates_evaluated, 0);
        }
    }

    #[test]
    fn test_refusing_evaluator_yields_no_plan() {
        let refuse = |_: &JoinTree| -> Result<f64> {
            Err(Error::CollaboratorRefusal("nothing joins".to_string()))
        };
        let config = SearchConfig::new(4, 2, ShapeMode::Linear);
        let view = SharedSearchView::new(&config, &refuse);
        let result = WorkerTask::new(0, &view).run();
        assert!(result.plan.is_none());
        assert!(result.stats.refusals > 0);
        assert_eq!(
            result.local_optimum().unwrap_err(),
            Error::NoAdmissiblePlan { part_id: 0 }
        );
    }

    #[test]
    fn test_bushy_worker_covers_full_set() {
        let config = SearchConfig::new(6, 4, ShapeMode::Bushy);
        let view = SharedSearchView::new(&config, &root_size_cost);
        for part in 0..4 {
            let result = WorkerTask::new(part, &view).run();
            let plan = result.local_optimum().unwrap();
            assert_eq!(plan.tree.covered(), 0b111111);
            assert!(plan.tree.validate().is_ok());
        }
    }
}
