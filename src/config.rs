//! Search configuration
//!
//! [`SearchConfig`] carries every knob the coordinator reads. It is plain data
//! (serde-serializable) so hosts can keep it next to the rest of their planner
//! settings and load it from JSON.

use crate::join_search::MAX_RELATIONS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Join-tree shapes a search explores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeMode {
    /// Left-deep trees only; relations are partitioned in pairs
    Linear,
    /// Any binary tree; relations are partitioned in triples
    Bushy,
}

impl ShapeMode {
    /// Width of the relation groups the partitioning works on
    pub fn group_width(self) -> usize {
        match self {
            ShapeMode::Linear => 2,
            ShapeMode::Bushy => 3,
        }
    }
}

impl fmt::Display for ShapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeMode::Linear => write!(f, "linear"),
            ShapeMode::Bushy => write!(f, "bushy"),
        }
    }
}

impl FromStr for ShapeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "left-deep" => Ok(ShapeMode::Linear),
            "bushy" => Ok(ShapeMode::Bushy),
            other => Err(Error::Config(format!("unknown shape mode '{}'", other))),
        }
    }
}

/// When the reconstructor asks the join builder to merge two fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Always attempt the join
    #[default]
    Force,
    /// Attempt the join only when the builder reports it as desirable
    /// (a join clause or ordering restriction applies); otherwise defer
    DesirableOnly,
}

/// Parallel join search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of base relations to join
    pub levels_needed: usize,
    /// Number of partitions / worker tasks
    pub n_workers: usize,
    /// Explored tree shapes
    pub shape_mode: ShapeMode,
    /// Whether the cost evaluator may be called from several workers at once
    pub evaluator_reentrant: bool,
    /// Reconstruction join policy
    pub join_policy: JoinPolicy,
    /// Upper bound on OS threads backing the workers; `None` means one per worker
    pub max_threads: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            levels_needed: 0,
            n_workers: prev_power_of_two(cores),
            shape_mode: ShapeMode::Linear,
            evaluator_reentrant: true,
            join_policy: JoinPolicy::Force,
            max_threads: None,
        }
    }
}

impl SearchConfig {
    pub fn new(levels_needed: usize, n_workers: usize, shape_mode: ShapeMode) -> Self {
        Self {
            levels_needed,
            n_workers,
            shape_mode,
            ..Default::default()
        }
    }

    pub fn with_levels(mut self, levels_needed: usize) -> Self {
        self.levels_needed = levels_needed;
        self
    }

    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    pub fn with_shape_mode(mut self, shape_mode: ShapeMode) -> Self {
        self.shape_mode = shape_mode;
        self
    }

    pub fn with_evaluator_reentrant(mut self, reentrant: bool) -> Self {
        self.evaluator_reentrant = reentrant;
        self
    }

    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = policy;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = Some(max_threads);
        self
    }

    /// Reject configurations no worker should be started for.
    ///
    /// Capacity is checked first so an oversized query always reports
    /// [`Error::CapacityExceeded`].
    pub fn validate(&self) -> Result<()> {
        if self.levels_needed > MAX_RELATIONS {
            return Err(Error::CapacityExceeded {
                requested: self.levels_needed,
                max: MAX_RELATIONS,
            });
        }
        if self.levels_needed == 0 {
            return Err(Error::Config("levels_needed must be at least 1".to_string()));
        }
        if self.n_workers == 0 {
            return Err(Error::Config("n_workers must be at least 1".to_string()));
        }
        if self.max_threads == Some(0) {
            return Err(Error::Config("max_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Threads in the worker pool
    pub fn pool_threads(&self) -> usize {
        let cap = self.max_threads.unwrap_or(self.n_workers);
        self.n_workers.min(cap).max(1)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Largest power of two not above `n` (1 for `n == 0`).
pub fn prev_power_of_two(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}
