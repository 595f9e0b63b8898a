//! Interfaces to the host planner
//!
//! The search never computes costs or builds relations itself. The host
//! supplies a [`CostEvaluator`] for scoring candidate trees, a
//! [`RelationCatalog`] that resolves relation indices, and a [`JoinBuilder`]
//! that materializes pairwise joins during reconstruction.

use super::join_tree::{JoinTree, RelationIndex};
use crate::Result;

/// Scores candidate join trees. Lower is better.
///
/// Returning [`crate::Error::CollaboratorRefusal`] (or a non-finite cost)
/// marks the candidate as unusable; the search carries on without it.
pub trait CostEvaluator: Send + Sync {
    fn evaluate(&self, tree: &JoinTree) -> Result<f64>;
}

impl<F> CostEvaluator for F
where
    F: Fn(&JoinTree) -> Result<f64> + Send + Sync,
{
    fn evaluate(&self, tree: &JoinTree) -> Result<f64> {
        self(tree)
    }
}

/// Resolves relation indices to the host's relation objects
pub trait RelationCatalog: Sync {
    type Relation: Clone;

    fn relation_count(&self) -> usize;

    fn relation(&self, index: RelationIndex) -> Option<Self::Relation>;
}

impl<R: Clone + Sync> RelationCatalog for [R] {
    type Relation = R;

    fn relation_count(&self) -> usize {
        self.len()
    }

    fn relation(&self, index: RelationIndex) -> Option<R> {
        self.get(index).cloned()
    }
}

impl<R: Clone + Sync> RelationCatalog for Vec<R> {
    type Relation = R;

    fn relation_count(&self) -> usize {
        self.len()
    }

    fn relation(&self, index: RelationIndex) -> Option<R> {
        self.get(index).cloned()
    }
}

/// Materializes the join of two already-built relations
pub trait JoinBuilder<R> {
    /// Join `outer` with `inner`, or refuse with
    /// [`crate::Error::CollaboratorRefusal`] when the pair cannot be joined
    /// directly.
    fn join(&self, outer: &R, inner: &R) -> Result<R>;

    /// Whether joining the pair now is worthwhile (a join clause or an
    /// ordering restriction connects them). Consulted only under
    /// [`crate::config::JoinPolicy::DesirableOnly`].
    fn is_desirable(&self, _outer: &R, _inner: &R) -> bool {
        true
    }
}
