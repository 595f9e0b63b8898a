//! Join tree values and relation bitmasks
//!
//! A [`JoinTree`] is an immutable binary tree over base relation indices. Each
//! node caches the bitmask of relations it covers, which is also the key the
//! DP table is indexed by.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a base relation in the search input
pub type RelationIndex = usize;

/// Bitmask over relation indices; bit `i` set means relation `i` is present
pub type RelMask = u32;

/// Largest number of relations a single-word mask can describe
pub const MAX_RELATIONS: usize = 31;

/// Mask with every relation in `0..n` set.
pub fn full_mask(n: usize) -> RelMask {
    debug_assert!(n <= MAX_RELATIONS);
    if n == 0 {
        0
    } else {
        (1u32 << n) - 1
    }
}

/// Mask holding only `relation`.
pub fn singleton(relation: RelationIndex) -> RelMask {
    1u32 << relation
}

/// Relation indices set in `mask`, ascending.
pub fn mask_members(mask: RelMask) -> impl Iterator<Item = RelationIndex> {
    (0..32usize).filter(move |i| mask & (1u32 << i) != 0)
}

/// Join tree structure for representing candidate join shapes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinTree {
    /// Base relation
    Leaf { relation: RelationIndex },
    /// Join of two disjoint subtrees
    Join {
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        covered: RelMask,
    },
}

impl JoinTree {
    pub fn leaf(relation: RelationIndex) -> Self {
        JoinTree::Leaf { relation }
    }

    /// Join two subtrees. Fails if they share a relation.
    pub fn join(left: JoinTree, right: JoinTree) -> Result<Self> {
        let (l, r) = (left.covered(), right.covered());
        if l & r != 0 {
            return Err(Error::InvalidTree(format!(
                "children overlap on mask {:#b}",
                l & r
            )));
        }
        Ok(JoinTree::Join {
            left: Box::new(left),
            right: Box::new(right),
            covered: l | r,
        })
    }

    /// Union of the relation indices in this tree
    pub fn covered(&self) -> RelMask {
        match self {
            JoinTree::Leaf { relation } => singleton(*relation),
            JoinTree::Join { covered, .. } => *covered,
        }
    }

    /// Number of base relations
    pub fn size(&self) -> usize {
        self.covered().count_ones() as usize
    }

    pub fn depth(&self) -> usize {
        match self {
            JoinTree::Leaf { .. } => 0,
            JoinTree::Join { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, JoinTree::Leaf { .. })
    }

    /// True when every right child is a base relation.
    pub fn is_left_deep(&self) -> bool {
        match self {
            JoinTree::Leaf { .. } => true,
            JoinTree::Join { left, right, .. } => right.is_leaf() && left.is_left_deep(),
        }
    }

    /// Relation indices in left-to-right leaf order. For a left-deep tree
    /// this is the join order.
    pub fn leaf_order(&self) -> Vec<RelationIndex> {
        let mut order = Vec::with_capacity(self.size());
        self.collect_leaves(&mut order);
        order
    }

    fn collect_leaves(&self, out: &mut Vec<RelationIndex>) {
        match self {
            JoinTree::Leaf { relation } => out.push(*relation),
            JoinTree::Join { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    /// Number of join nodes
    pub fn join_count(&self) -> usize {
        match self {
            JoinTree::Leaf { .. } => 0,
            JoinTree::Join { left, right, .. } => 1 + left.join_count() + right.join_count(),
        }
    }

    /// Re-check the disjointness invariant over the whole tree, including
    /// trees that came from deserialization rather than [`JoinTree::join`].
    pub fn validate(&self) -> Result<RelMask> {
        match self {
            JoinTree::Leaf { relation } => {
                if *relation >= MAX_RELATIONS {
                    return Err(Error::InvalidTree(format!(
                        "relation {} outside mask width",
                        relation
                    )));
                }
                Ok(singleton(*relation))
            }
            JoinTree::Join {
                left,
                right,
                covered,
            } => {
                let l = left.validate()?;
                let r = right.validate()?;
                if l & r != 0 {
                    return Err(Error::InvalidTree(format!(
                        "children overlap on mask {:#b}",
                        l & r
                    )));
                }
                if l | r != *covered {
                    return Err(Error::InvalidTree(format!(
                        "cached mask {:#b} does not match children {:#b}",
                        covered,
                        l | r
                    )));
                }
                Ok(*covered)
            }
        }
    }
}

impl fmt::Display for JoinTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinTree::Leaf { relation } => write!(f, "{}", relation),
            JoinTree::Join { left, right, .. } => write!(f, "({} ⋈ {})", left, right),
        }
    }
}

/// A join tree paired with its evaluated cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub tree: JoinTree,
    /// Opaque evaluator cost; lower is better, `+inf` means no legal plan
    pub cost: f64,
}

impl CandidatePlan {
    pub fn new(tree: JoinTree, cost: f64) -> Self {
        Self { tree, cost }
    }

    pub fn mask(&self) -> RelMask {
        self.tree.covered()
    }

    /// Strictly cheaper than `other`
    pub fn is_cheaper_than(&self, other: &CandidatePlan) -> bool {
        self.cost < other.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left_deep(order: &[usize]) -> JoinTree {
        let mut tree = JoinTree::leaf(order[0]);
        for &r in &order[1..] {
            tree = JoinTree::join(tree, JoinTree::leaf(r)).unwrap();
        }
        tree
    }

    #[test]
    fn test_masks() {
        assert_eq!(full_mask(0), 0);
        assert_eq!(full_mask(3), 0b111);
        assert_eq!(full_mask(31), 0x7fff_ffff);
        assert_eq!(singleton(4), 0b10000);
        assert_eq!(mask_members(0b1011).collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn test_join_covers_union() {
        let tree = left_deep(&[2, 0, 1]);
        assert_eq!(tree.covered(), 0b111);
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.join_count(), 2);
        assert_eq!(tree.leaf_order(), vec![2, 0, 1]);
        assert!(tree.is_left_deep());
    }

    #[test]
    fn test_overlapping_join_rejected() {
        let a = left_deep(&[0, 1]);
        let b = left_deep(&[1, 2]);
        assert!(matches!(JoinTree::join(a, b), Err(Error::InvalidTree(_))));
    }

    #[test]
    fn test_bushy_shape() {
        let ab = left_deep(&[0, 1]);
        let cd = left_deep(&[2, 3]);
        let tree = JoinTree::join(ab, cd).unwrap();
        assert!(!tree.is_left_deep());
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.to_string(), "((0 ⋈ 1) ⋈ (2 ⋈ 3))");
    }

    #[test]
    fn test_validate_catches_bad_cached_mask() {
        let tree = JoinTree::Join {
            left: Box::new(JoinTree::leaf(0)),
            right: Box::new(JoinTree::leaf(1)),
            covered: 0b111,
        };
        assert!(tree.validate().is_err());
        assert_eq!(left_deep(&[0, 1, 2]).validate().unwrap(), 0b111);
    }

    #[test]
    fn test_serde_roundtrip_preserves_shape() {
        let tree = left_deep(&[1, 0, 2]);
        let json = serde_json::to_string(&tree).unwrap();
        let back: JoinTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_candidate_ordering() {
        let cheap = CandidatePlan::new(JoinTree::leaf(0), 1.0);
        let dear = CandidatePlan::new(JoinTree::leaf(0), 2.0);
        assert!(cheap.is_cheaper_than(&dear));
        assert!(!dear.is_cheaper_than(&cheap));
        assert!(!cheap.is_cheaper_than(&cheap.clone()));
        assert_eq!(cheap.mask(), 1);
    }
}
