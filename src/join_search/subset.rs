use super::join_tree::{singleton, RelMask, RelationIndex};
use smallvec::SmallVec;

/// An ordered, duplicate-free set of relations plus its bitmask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    members: SmallVec<[RelationIndex; 8]>,
    mask: RelMask,
}

impl Subset {
    /// Build from members in the given order; repeats are dropped.
    pub fn from_members<I: IntoIterator<Item = RelationIndex>>(members: I) -> Self {
        let mut subset = Subset {
            members: SmallVec::new(),
            mask: 0,
        };
        for m in members {
            subset.push(m);
        }
        subset
    }

    pub fn single(relation: RelationIndex) -> Self {
        Self::from_members([relation])
    }

    fn push(&mut self, relation: RelationIndex) {
        let bit = singleton(relation);
        if self.mask & bit == 0 {
            self.mask |= bit;
            self.members.push(relation);
        }
    }

    /// Members of `self` followed by the members of `other` not already present
    pub fn concat(&self, other: &Subset) -> Subset {
        let mut out = self.clone();
        for &m in &other.members {
            out.push(m);
        }
        out
    }

    pub fn members(&self) -> &[RelationIndex] {
        &self.members
    }

    pub fn mask(&self) -> RelMask {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, relation: RelationIndex) -> bool {
        self.mask & singleton(relation) != 0
    }
}
