//! Admissible intermediate subsets
//!
//! Every group of relations contributes a small set of *local choices* (the
//! shapes of that group that may appear in an intermediate result under the
//! worker's constraints). An admissible subset picks at most one local choice
//! per group and unions them. Folding the groups left to right with
//! [`combine`] produces every such union, from singletons up to the full set.

use super::constraints::{relation_groups, OrderConstraint, RelationGroup};
use super::join_tree::RelationIndex;
use super::subset::Subset;
use crate::config::ShapeMode;
use std::collections::HashSet;

/// Enumerates the subsets a worker's DP table will be filled for
#[derive(Debug, Clone, Copy)]
pub struct AdmissibleSetEnumerator {
    levels_needed: usize,
    shape_mode: ShapeMode,
}

impl AdmissibleSetEnumerator {
    pub fn new(levels_needed: usize, shape_mode: ShapeMode) -> Self {
        Self {
            levels_needed,
            shape_mode,
        }
    }

    /// Admissible subsets under `constraints`, unique by mask and sorted by
    /// ascending member count.
    pub fn enumerate(&self, constraints: &[OrderConstraint]) -> Vec<Subset> {
        let mut admissible = Vec::new();
        for group in relation_groups(self.levels_needed, self.shape_mode) {
            let local = local_choices(&group, constraints);
            admissible = combine(admissible, &local);
        }

        let mut seen = HashSet::with_capacity(admissible.len());
        admissible.retain(|s: &Subset| seen.insert(s.mask()));
        admissible.sort_by_key(Subset::len);
        admissible
    }
}

/// Shapes of `group` allowed by `constraints`.
pub fn local_choices(group: &RelationGroup, constraints: &[OrderConstraint]) -> Vec<Subset> {
    // `relation` is excludable only by a constraint whose both ends lie in
    // this group.
    let held_back = |relation: RelationIndex| {
        constraints
            .iter()
            .any(|c| c.after == relation && group.contains(c.before))
    };

    match group {
        RelationGroup::Pair(q1, q2) => {
            let mut choices = Vec::with_capacity(3);
            if !held_back(*q1) {
                choices.push(Subset::single(*q1));
            }
            if !held_back(*q2) {
                choices.push(Subset::single(*q2));
            }
            choices.push(Subset::from_members([*q1, *q2]));
            choices
        }
        RelationGroup::Triple { satellites, hub } => {
            let [s1, s2] = *satellites;
            let mut choices = vec![
                Subset::single(s1),
                Subset::single(s2),
                Subset::single(*hub),
                Subset::from_members([s1, s2]),
            ];
            if !held_back(s1) {
                choices.push(Subset::from_members([s1, *hub]));
            }
            if !held_back(s2) {
                choices.push(Subset::from_members([s2, *hub]));
            }
            choices.push(Subset::from_members([s1, s2, *hub]));
            choices
        }
        RelationGroup::Trailing(members) => {
            let n = members.len();
            (1u32..(1 << n))
                .map(|bits| {
                    Subset::from_members(
                        members
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| bits & (1 << i) != 0)
                            .map(|(_, &m)| m),
                    )
                })
                .collect()
        }
    }
}

/// `existing ∪ local ∪ { e ++ l | e ∈ existing, l ∈ local }`
///
/// Groups are disjoint, so every concatenation is a new subset; duplicates by
/// mask can only come from callers passing overlapping groups and are removed
/// by [`AdmissibleSetEnumerator::enumerate`].
pub fn combine(existing: Vec<Subset>, local: &[Subset]) -> Vec<Subset> {
    if existing.is_empty() {
        return local.to_vec();
    }
    if local.is_empty() {
        return existing;
    }

    let mut out = Vec::with_capacity(existing.len() * (local.len() + 1) + local.len());
    for e in &existing {
        for l in local {
            out.push(e.concat(l));
        }
    }
    let mut combined = existing;
    combined.extend(local.iter().cloned());
    combined.append(&mut out);
    combined
}
