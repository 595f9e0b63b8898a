//! Reference cardinality cost model
//!
//! A small join graph with per-relation row counts and per-edge selectivities.
//! The cardinality of a relation set is the product of its row counts times
//! the selectivity of every edge inside the set; the cost of a tree is the sum
//! of the cardinalities of its join nodes (C_out). Used by the CLI, the
//! benchmarks and the tests as a stand-in for a host planner.

use super::collaborators::{CostEvaluator, JoinBuilder};
use super::join_tree::{mask_members, singleton, JoinTree, RelMask, RelationIndex};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub left: RelationIndex,
    pub right: RelationIndex,
    pub selectivity: f64,
}

impl JoinEdge {
    fn mask(&self) -> RelMask {
        singleton(self.left) | singleton(self.right)
    }
}

/// Relation produced by [`CardinalityModel`] acting as a join builder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedRelation {
    pub mask: RelMask,
    pub cardinality: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardinalityModel {
    cardinalities: Vec<f64>,
    edges: Vec<JoinEdge>,
    allow_cross_products: bool,
}

impl CardinalityModel {
    /// Model with no join edges; cross products are refused until edges are
    /// added or [`Self::with_cross_products`] allows them.
    pub fn new(cardinalities: Vec<f64>) -> Self {
        Self {
            cardinalities,
            edges: Vec::new(),
            allow_cross_products: false,
        }
    }

    /// Chain query: relation `i` joins relation `i + 1`.
    pub fn chain(cardinalities: Vec<f64>, selectivity: f64) -> Self {
        let n = cardinalities.len();
        let mut model = Self::new(cardinalities);
        for i in 1..n {
            model = model.with_edge(i - 1, i, selectivity);
        }
        model
    }

    /// Star query: relation 0 joins every other relation.
    pub fn star(cardinalities: Vec<f64>, selectivity: f64) -> Self {
        let n = cardinalities.len();
        let mut model = Self::new(cardinalities);
        for i in 1..n {
            model = model.with_edge(0, i, selectivity);
        }
        model
    }

    pub fn with_edge(mut self, left: RelationIndex, right: RelationIndex, selectivity: f64) -> Self {
        self.edges.push(JoinEdge {
            left,
            right,
            selectivity,
        });
        self
    }

    pub fn with_cross_products(mut self, allow: bool) -> Self {
        self.allow_cross_products = allow;
        self
    }

    pub fn relation_count(&self) -> usize {
        self.cardinalities.len()
    }

    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    /// Base relations as builder inputs, labelled `r0`, `r1`, ...
    pub fn relations(&self) -> Vec<EstimatedRelation> {
        self.cardinalities
            .iter()
            .enumerate()
            .map(|(i, &cardinality)| EstimatedRelation {
                mask: singleton(i),
                cardinality,
                label: format!("r{}", i),
            })
            .collect()
    }

    /// Estimated rows produced by joining every relation in `mask`.
    pub fn estimate(&self, mask: RelMask) -> f64 {
        let rows: f64 = mask_members(mask)
            .filter_map(|i| self.cardinalities.get(i))
            .product();
        let selectivity: f64 = self
            .edges
            .iter()
            .filter(|e| e.mask() & mask == e.mask())
            .map(|e| e.selectivity)
            .product();
        rows * selectivity
    }

    /// Whether some edge crosses between the two sets.
    pub fn connected(&self, a: RelMask, b: RelMask) -> bool {
        self.edges.iter().any(|e| {
            let (l, r) = (singleton(e.left), singleton(e.right));
            (l & a != 0 && r & b != 0) || (l & b != 0 && r & a != 0)
        })
    }

    fn check_join(&self, left: RelMask, right: RelMask) -> Result<()> {
        if !self.allow_cross_products && !self.connected(left, right) {
            return Err(Error::CollaboratorRefusal(format!(
                "cross product between {:#b} and {:#b}",
                left, right
            )));
        }
        Ok(())
    }

    /// C_out cost of `tree`.
    pub fn tree_cost(&self, tree: &JoinTree) -> Result<f64> {
        match tree {
            JoinTree::Leaf { relation } => {
                if *relation >= self.cardinalities.len() {
                    return Err(Error::UnknownRelation(*relation));
                }
                Ok(0.0)
            }
            JoinTree::Join {
                left,
                right,
                covered,
            } => {
                // Children first, so a bad leaf is reported as such rather
                // than as a refused join.
                let children = self.tree_cost(left)? + self.tree_cost(right)?;
                self.check_join(left.covered(), right.covered())?;
                Ok(children + self.estimate(*covered))
            }
        }
    }
}

impl CostEvaluator for CardinalityModel {
    fn evaluate(&self, tree: &JoinTree) -> Result<f64> {
        self.tree_cost(tree)
    }
}

impl JoinBuilder<EstimatedRelation> for CardinalityModel {
    fn join(&self, outer: &EstimatedRelation, inner: &EstimatedRelation) -> Result<EstimatedRelation> {
        self.check_join(outer.mask, inner.mask)?;
        let mask = outer.mask | inner.mask;
        Ok(EstimatedRelation {
            mask,
            cardinality: self.estimate(mask),
            label: format!("({} ⋈ {})", outer.label, inner.label),
        })
    }

    fn is_desirable(&self, outer: &EstimatedRelation, inner: &EstimatedRelation) -> bool {
        self.connected(outer.mask, inner.mask)
    }
}
