//! Partition constraints
//!
//! The search space is split by orienting groups of adjacent relations. In
//! LINEAR mode relations are grouped in pairs `(2i, 2i+1)`; in BUSHY mode in
//! triples `(3i, 3i+1, 3i+2)` whose first two members are *satellites* and
//! whose third is the *hub*. Bit `i` of a worker's `part_id` decides which
//! member of group `i` comes first. Only the lowest `floor(log2 n_workers)`
//! groups are oriented; the rest are free in every worker.

use super::join_tree::RelationIndex;
use crate::config::{SearchConfig, ShapeMode};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// `before` must be present in any admissible subset that holds `after`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderConstraint {
    pub before: RelationIndex,
    pub after: RelationIndex,
}

impl OrderConstraint {
    pub fn new(before: RelationIndex, after: RelationIndex) -> Self {
        Self { before, after }
    }
}

/// A run of adjacent relations the enumerator treats as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationGroup {
    /// LINEAR group `(2i, 2i+1)`
    Pair(RelationIndex, RelationIndex),
    /// BUSHY group; the two satellites may be oriented, the hub never is
    Triple {
        satellites: [RelationIndex; 2],
        hub: RelationIndex,
    },
    /// Relations left over after the last full group; never constrained
    Trailing(SmallVec<[RelationIndex; 2]>),
}

impl RelationGroup {
    pub fn members(&self) -> SmallVec<[RelationIndex; 3]> {
        match self {
            RelationGroup::Pair(a, b) => SmallVec::from_slice(&[*a, *b]),
            RelationGroup::Triple { satellites, hub } => {
                SmallVec::from_slice(&[satellites[0], satellites[1], *hub])
            }
            RelationGroup::Trailing(rest) => rest.iter().copied().collect(),
        }
    }

    pub fn contains(&self, relation: RelationIndex) -> bool {
        self.members().contains(&relation)
    }
}

/// Split `0..levels_needed` into full groups of the mode's width plus an
/// optional trailing group.
pub fn relation_groups(levels_needed: usize, shape_mode: ShapeMode) -> Vec<RelationGroup> {
    let width = shape_mode.group_width();
    let full = levels_needed / width;
    let mut groups = Vec::with_capacity(full + 1);

    for i in 0..full {
        let base = width * i;
        groups.push(match shape_mode {
            ShapeMode::Linear => RelationGroup::Pair(base, base + 1),
            ShapeMode::Bushy => RelationGroup::Triple {
                satellites: [base, base + 1],
                hub: base + 2,
            },
        });
    }

    if full * width < levels_needed {
        groups.push(RelationGroup::Trailing(
            (full * width..levels_needed).collect(),
        ));
    }
    groups
}

/// Derives each worker's ordering constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintGenerator {
    levels_needed: usize,
    n_workers: usize,
    shape_mode: ShapeMode,
}

impl ConstraintGenerator {
    pub fn new(levels_needed: usize, n_workers: usize, shape_mode: ShapeMode) -> Self {
        Self {
            levels_needed,
            n_workers: n_workers.max(1),
            shape_mode,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.levels_needed, config.n_workers, config.shape_mode)
    }

    pub fn shape_mode(&self) -> ShapeMode {
        self.shape_mode
    }

    /// Bits of `part_id` that select an orientation: `floor(log2 n_workers)`
    pub fn distinguished_bits(&self) -> usize {
        (usize::BITS - 1 - self.n_workers.max(1).leading_zeros()) as usize
    }

    /// Groups that actually receive a constraint
    pub fn constrained_groups(&self) -> usize {
        let full_groups = self.levels_needed / self.shape_mode.group_width();
        self.distinguished_bits().min(full_groups)
    }

    /// Number of distinct subspaces the workers cover
    pub fn partition_count(&self) -> usize {
        1 << self.constrained_groups()
    }

    pub fn groups(&self) -> Vec<RelationGroup> {
        relation_groups(self.levels_needed, self.shape_mode)
    }

    /// Constraints for the worker with `part_id`.
    ///
    /// Bit `i` clear keeps the lower-indexed member first; bit `i` set swaps
    /// the pair. Workers whose `part_id` differs only above the distinguished
    /// bits receive identical constraints.
    pub fn generate(&self, part_id: usize) -> Vec<OrderConstraint> {
        let width = self.shape_mode.group_width();
        (0..self.constrained_groups())
            .map(|i| {
                let (first, second) = (width * i, width * i + 1);
                if part_id & (1 << i) != 0 {
                    OrderConstraint::new(second, first)
                } else {
                    OrderConstraint::new(first, second)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_linear_constraints_follow_part_bits() {
        let gen = ConstraintGenerator::new(5, 4, ShapeMode::Linear);
        assert_eq!(gen.distinguished_bits(), 2);
        assert_eq!(
            gen.generate(0),
            vec![OrderConstraint::new(0, 1), OrderConstraint::new(2, 3)]
        );
        assert_eq!(
            gen.generate(2),
            vec![OrderConstraint::new(0, 1), OrderConstraint::new(3, 2)]
        );
        assert_eq!(
            gen.generate(3),
            vec![OrderConstraint::new(1, 0), OrderConstraint::new(3, 2)]
        );
    }

    #[test]
    fn test_groups_beyond_levels_are_free() {
        // Eight workers want three bits but three relations only hold one pair.
        let gen = ConstraintGenerator::new(3, 8, ShapeMode::Linear);
        assert_eq!(gen.constrained_groups(), 1);
        assert_eq!(gen.partition_count(), 2);
        assert_eq!(gen.generate(5), vec![OrderConstraint::new(1, 0)]);
    }

    #[test]
    fn test_single_worker_is_unconstrained() {
        let gen = ConstraintGenerator::new(6, 1, ShapeMode::Linear);
        assert!(gen.generate(0).is_empty());
        assert_eq!(gen.partition_count(), 1);
    }

    #[test]
    fn test_non_power_of_two_rounds_down() {
        let gen = ConstraintGenerator::new(8, 3, ShapeMode::Linear);
        assert_eq!(gen.distinguished_bits(), 1);
        // Worker 2 repeats worker 0's orientation.
        assert_eq!(gen.generate(2), gen.generate(0));
        assert_ne!(gen.generate(1), gen.generate(0));
    }

    #[test]
    fn test_distinct_constraints_per_partition() {
        let gen = ConstraintGenerator::new(10, 16, ShapeMode::Linear);
        let sets: HashSet<Vec<OrderConstraint>> = (0..16).map(|p| gen.generate(p)).collect();
        assert_eq!(sets.len(), 16);
    }

    #[test]
    fn test_bushy_constraints_orient_satellites() {
        let gen = ConstraintGenerator::new(6, 4, ShapeMode::Bushy);
        assert_eq!(
            gen.generate(1),
            vec![OrderConstraint::new(1, 0), OrderConstraint::new(3, 4)]
        );
        assert_eq!(
            gen.generate(2),
            vec![OrderConstraint::new(0, 1), OrderConstraint::new(4, 3)]
        );
    }

    #[test]
    fn test_relation_groups_with_trailing() {
        let linear = relation_groups(5, ShapeMode::Linear);
        assert_eq!(linear.len(), 3);
        assert_eq!(linear[0], RelationGroup::Pair(0, 1));
        assert_eq!(linear[2], RelationGroup::Trailing(SmallVec::from_slice(&[4])));

        let bushy = relation_groups(5, ShapeMode::Bushy);
        assert_eq!(bushy.len(), 2);
        assert_eq!(
            bushy[0],
            RelationGroup::Triple {
                satellites: [0, 1],
                hub: 2
            }
        );
        assert_eq!(bushy[1].members().as_slice(), &[3, 4]);

        assert_eq!(relation_groups(1, ShapeMode::Bushy).len(), 1);
        assert!(relation_groups(6, ShapeMode::Bushy)
            .iter()
            .all(|g| matches!(g, RelationGroup::Triple { .. })));
    }
}
