//! Dispatches worker tasks and reduces their local optima
//!
//! All `n_workers` partitions run concurrently on a dedicated rayon pool. The
//! coordinator waits for every worker before reducing, and the reduction is a
//! min-fold in `part_id` order so the winner does not depend on completion
//! order.

use super::collaborators::CostEvaluator;
use super::context::SharedSearchView;
use super::join_tree::CandidatePlan;
use super::worker::{WorkerResult, WorkerTask};
use crate::config::SearchConfig;
use crate::{Error, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of the parallel optimization phase
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Global optimum
    pub plan: CandidatePlan,
    /// Partition that produced it
    pub winning_part: usize,
    /// Every worker's result, in `part_id` order
    pub workers: Vec<WorkerResult>,
}

impl SearchReport {
    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerResult> {
        self.workers.iter().filter(|w| w.plan.is_none())
    }
}

/// Runs the partitioned search
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: SearchConfig,
}

impl Coordinator {
    /// Validates `config` before anything is dispatched.
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run every partition and return the cheapest full plan.
    pub fn optimize<E: CostEvaluator + ?Sized>(&self, evaluator: &E) -> Result<SearchReport> {
        let start = Instant::now();
        let n_workers = self.config.n_workers;
        info!(
            levels = self.config.levels_needed,
            workers = n_workers,
            mode = %self.config.shape_mode,
            serialized_evaluator = !self.config.evaluator_reentrant,
            "starting parallel join search"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.pool_threads())
            .thread_name(|i| format!("join-search-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let view = SharedSearchView::new(&self.config, evaluator);
        let workers: Vec<WorkerResult> = pool.install(|| {
            (0..n_workers)
                .into_par_iter()
                .map(|part_id| WorkerTask::new(part_id, &view).run())
                .collect()
        });

        for failed in workers.iter().filter(|w| w.plan.is_none()) {
            debug!(part_id = failed.part_id, "worker produced no plan for the full relation set");
        }

        let winner = match reduce(&workers) {
            Some(w) => w,
            None => {
                warn!(workers = n_workers, "every worker failed to produce a plan");
                return Err(Error::AllWorkersFailed { workers: n_workers });
            }
        };
        let winning_part = winner.part_id;
        let plan = winner.local_optimum()?.clone();

        info!(
            winning_part,
            cost = plan.cost,
            elapsed_us = start.elapsed().as_micros() as u64,
            "parallel join search finished"
        );

        Ok(SearchReport {
            plan,
            winning_part,
            workers,
        })
    }
}

/// Cheapest result with a plan; equal costs go to the lowest `part_id`.
pub fn reduce(results: &[WorkerResult]) -> Option<&WorkerResult> {
    results
        .iter()
        .filter(|r| r.plan.is_some())
        .fold(None, |best: Option<&WorkerResult>, candidate| match best {
            None => Some(candidate),
            Some(current) => {
                let (c, b) = (candidate.cost(), current.cost());
                if c < b || (c == b && candidate.part_id < current.part_id) {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeMode;
    use crate::join_search::join_tree::JoinTree;
    use crate::join_search::worker::WorkerStats;

    fn result(part_id: usize, cost: Option<f64>) -> WorkerResult {
        WorkerResult {
            part_id,
            plan: cost.map(|c| CandidatePlan::new(JoinTree::leaf(0), c)),
            stats: WorkerStats::default(),
        }
    }

    #[test]
    fn test_reduce_picks_minimum() {
        let results = vec![result(0, Some(5.0)), result(1, Some(2.0)), result(2, Some(3.0))];
        assert_eq!(reduce(&results).unwrap().part_id, 1);
    }

    #[test]
    fn test_reduce_ties_go_to_lowest_part() {
        let mut results = vec![result(2, Some(1.0)), result(0, Some(1.0)), result(1, Some(4.0))];
        assert_eq!(reduce(&results).unwrap().part_id, 0);
        results.reverse();
        assert_eq!(reduce(&results).unwrap().part_id, 0);
    }

    #[test]
    fn test_reduce_skips_failures() {
        let results = vec![result(0, None), result(1, Some(9.0)), result(2, None)];
        assert_eq!(reduce(&results).unwrap().part_id, 1);
        assert!(reduce(&[result(0, None), result(1, None)]).is_none());
        assert!(reduce(&[]).is_none());
    }

    #[test]
    fn test_capacity_checked_before_dispatch() {
        let err = Coordinator::new(SearchConfig::new(40, 4, ShapeMode::Linear)).unwrap_err();
        assert_eq!(
            err,
            Error::CapacityExceeded {
                requested: 40,
                max: 31
            }
        );
    }

    #[test]
    fn test_optimize_collects_every_worker() {
        let evaluator = |tree: &JoinTree| -> Result<f64> { Ok(tree.size() as f64) };
        let coordinator = Coordinator::new(SearchConfig::new(5, 4, ShapeMode::Linear)).unwrap();
        let report = coordinator.optimize(&evaluator).unwrap();
        assert_eq!(report.workers.len(), 4);
        assert!(report
            .workers
            .iter()
            .enumerate()
            .all(|(i, w)| w.part_id == i && w.plan.is_some()));
        assert_eq!(report.failed_workers().count(), 0);
        assert_eq!(report.plan.tree.covered(), 0b11111);
        // Every full plan costs the same here, so partition 0 wins the tie.
        assert_eq!(report.winning_part, 0);
    }

    #[test]
    fn test_all_workers_failed() {
        let evaluator =
            |_: &JoinTree| -> Result<f64> { Err(Error::CollaboratorRefusal("no".to_string())) };
        let coordinator = Coordinator::new(SearchConfig::new(3, 2, ShapeMode::Linear)).unwrap();
        assert_eq!(
            coordinator.optimize(&evaluator).unwrap_err(),
            Error::AllWorkersFailed { workers: 2 }
        );
    }

    #[test]
    fn test_serialized_evaluator_matches_concurrent() {
        let evaluator = |tree: &JoinTree| -> Result<f64> {
            Ok(tree.leaf_order().iter().enumerate().map(|(i, r)| (i * r) as f64).sum())
        };
        let base = SearchConfig::new(6, 4, ShapeMode::Linear);
        let concurrent = Coordinator::new(base.clone()).unwrap().optimize(&evaluator).unwrap();
        let serialized = Coordinator::new(base.with_evaluator_reentrant(false))
            .unwrap()
            .optimize(&evaluator)
            .unwrap();
        assert_eq!(concurrent.plan, serialized.plan);
        assert_eq!(concurrent.winning_part, serialized.winning_part);
    }
}
