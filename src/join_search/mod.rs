//! Partitioned parallel join-order search
//!
//! The space of join orders over `levels_needed` relations is split into
//! `n_workers` disjoint partitions by pairwise ordering constraints. Each
//! worker runs a bottom-up dynamic program restricted to the subsets its
//! constraints admit, and the coordinator keeps the cheapest local optimum.
//!
//! - LINEAR mode searches left-deep trees; each constrained pair of relations
//!   is ordered one way or the other depending on a bit of the partition id.
//! - BUSHY mode searches arbitrary binary trees; relations are grouped in
//!   triples and each constraint excludes one satellite/hub pairing.

pub mod admissible;
pub mod collaborators;
pub mod constraints;
pub mod context;
pub mod coordinator;
pub mod cost_model;
pub mod dp_table;
pub mod join_tree;
pub mod reconstruct;
pub mod subset;
pub mod worker;

pub use admissible::AdmissibleSetEnumerator;
pub use collaborators::{CostEvaluator, JoinBuilder, RelationCatalog};
pub use constraints::{ConstraintGenerator, OrderConstraint, RelationGroup};
pub use context::{EvaluatorGate, SharedSearchView};
pub use coordinator::{Coordinator, SearchReport};
pub use cost_model::{CardinalityModel, EstimatedRelation, JoinEdge};
pub use dp_table::{DPSearchTable, SplitOutcome};
pub use join_tree::{CandidatePlan, JoinTree, RelMask, RelationIndex, MAX_RELATIONS};
pub use reconstruct::{Clump, MaterializedPlan, PlanReconstructor};
pub use subset::Subset;
pub use worker::{WorkerResult, WorkerStats, WorkerTask};
