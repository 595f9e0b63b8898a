//! Read-only state shared by all workers of one search
//!
//! Everything a worker may touch concurrently lives in [`SharedSearchView`]
//! and is only ever borrowed immutably. Per-worker scratch (constraints,
//! subset lists, the DP table) is created inside the worker task and never
//! leaves it.

use super::collaborators::CostEvaluator;
use super::join_tree::JoinTree;
use crate::config::{SearchConfig, ShapeMode};
use crate::Result;
use parking_lot::Mutex;

/// How evaluator calls from different workers are ordered
#[derive(Debug)]
pub enum EvaluatorGate {
    /// The evaluator is reentrant; workers call it directly
    Concurrent,
    /// The evaluator touches hidden shared state; one call at a time
    Serialized(Mutex<()>),
}

impl EvaluatorGate {
    pub fn for_reentrancy(reentrant: bool) -> Self {
        if reentrant {
            EvaluatorGate::Concurrent
        } else {
            EvaluatorGate::Serialized(Mutex::new(()))
        }
    }

    pub fn is_serialized(&self) -> bool {
        matches!(self, EvaluatorGate::Serialized(_))
    }

    /// Run `f` under this gate.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        match self {
            EvaluatorGate::Concurrent => f(),
            EvaluatorGate::Serialized(lock) => {
                let _guard = lock.lock();
                f()
            }
        }
    }
}

/// Shared, immutable view handed to every worker task
pub struct SharedSearchView<'a, E: ?Sized> {
    levels_needed: usize,
    n_workers: usize,
    shape_mode: ShapeMode,
    evaluator: &'a E,
    gate: EvaluatorGate,
}

impl<'a, E: CostEvaluator + ?Sized> SharedSearchView<'a, E> {
    pub fn new(config: &SearchConfig, evaluator: &'a E) -> Self {
        Self {
            levels_needed: config.levels_needed,
            n_workers: config.n_workers,
            shape_mode: config.shape_mode,
            evaluator,
            gate: EvaluatorGate::for_reentrancy(config.evaluator_reentrant),
        }
    }

    pub fn levels_needed(&self) -> usize {
        self.levels_needed
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn shape_mode(&self) -> ShapeMode {
        self.shape_mode
    }

    pub fn gate(&self) -> &EvaluatorGate {
        &self.gate
    }

    /// Score `tree` through the configured gate.
    pub fn evaluate(&self, tree: &JoinTree) -> Result<f64> {
        self.gate.run(|| self.evaluator.evaluate(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_gate_selection() {
        assert!(!EvaluatorGate::for_reentrancy(true).is_serialized());
        assert!(EvaluatorGate::for_reentrancy(false).is_serialized());
    }

    #[test]
    fn test_serialized_gate_excludes_overlap() {
        let gate = Arc::new(EvaluatorGate::for_reentrancy(false));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        gate.run(|| {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_view_forwards_to_evaluator() {
        let evaluator = |tree: &JoinTree| -> Result<f64> { Ok(tree.size() as f64) };
        let config = SearchConfig::new(3, 2, ShapeMode::Linear).with_evaluator_reentrant(false);
        let view = SharedSearchView::new(&config, &evaluator);
        assert_eq!(view.levels_needed(), 3);
        assert_eq!(view.n_workers(), 2);
        assert!(view.gate().is_serialized());
        let tree = JoinTree::join(JoinTree::leaf(0), JoinTree::leaf(2)).unwrap();
        assert_eq!(view.evaluate(&tree).unwrap(), 2.0);
    }
}
