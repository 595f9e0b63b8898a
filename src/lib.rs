//! Parallel join-order search for a query planner.
//!
//! Given `levels_needed` base relations, [`search`] partitions the space of
//! join orders across a pool of workers, runs a dynamic program inside each
//! partition, and materializes the cheapest plan found through the caller's
//! [`JoinBuilder`]. Costs come from the caller's [`CostEvaluator`]; the search
//! never estimates anything on its own.
//!
//! ```no_run
//! use lightning_join::{search, CardinalityModel, SearchConfig, ShapeMode};
//!
//! let model = CardinalityModel::chain(vec![1000.0, 20.0, 500.0, 80.0], 0.01);
//! let relations = model.relations();
//! let config = SearchConfig::new(relations.len(), 4, ShapeMode::Linear);
//! let outcome = search(&relations, &config, &model, &model).unwrap();
//! println!("{} costs {}", outcome.tree, outcome.cost);
//! ```

pub mod config;
pub mod error;
pub mod join_search;
pub mod logging;

pub use config::{JoinPolicy, SearchConfig, ShapeMode};
pub use error::{Error, Result};
pub use join_search::{
    CandidatePlan, CardinalityModel, Coordinator, CostEvaluator, EstimatedRelation, JoinBuilder,
    JoinTree, MaterializedPlan, RelationCatalog, SearchReport, WorkerResult, WorkerStats,
    MAX_RELATIONS,
};

use join_search::PlanReconstructor;
use tracing::debug;

/// Result of a full search: the materialized plan and how it was found
#[derive(Debug, Clone)]
pub struct SearchOutcome<R> {
    pub plan: MaterializedPlan<R>,
    pub tree: JoinTree,
    pub cost: f64,
    pub winning_part: usize,
    /// Every worker's result, in `part_id` order
    pub workers: Vec<WorkerResult>,
}

/// Find the cheapest join order over the first `config.levels_needed`
/// relations of `catalog` and build it with `builder`.
///
/// Configuration problems (including more than [`MAX_RELATIONS`] relations)
/// are reported before any worker starts.
pub fn search<C, E, B>(
    catalog: &C,
    config: &SearchConfig,
    evaluator: &E,
    builder: &B,
) -> Result<SearchOutcome<C::Relation>>
where
    C: RelationCatalog + ?Sized,
    E: CostEvaluator + ?Sized,
    B: JoinBuilder<C::Relation> + ?Sized,
{
    let coordinator = Coordinator::new(config.clone())?;
    if catalog.relation_count() < config.levels_needed {
        return Err(Error::Config(format!(
            "catalog holds {} relations, {} needed",
            catalog.relation_count(),
            config.levels_needed
        )));
    }

    let report = coordinator.optimize(evaluator)?;
    let plan = PlanReconstructor::new(catalog, builder, config.join_policy)
        .reconstruct(&report.plan.tree)?;
    debug!(joins = plan.joins_built, "winning plan materialized");

    Ok(SearchOutcome {
        plan,
        tree: report.plan.tree,
        cost: report.plan.cost,
        winning_part: report.winning_part,
        workers: report.workers,
    })
}
