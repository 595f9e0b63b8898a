//! Turns the winning join tree into a host relation
//!
//! Each subtree yields a list of clumps: fragments already joined as far as
//! the [`JoinBuilder`] allowed. A new clump is merged into the list by trying
//! it against every existing clump; a successful merge is merged again with
//! what remains, a refused one is kept as a separate clump. The plan is
//! complete only when a single clump is left.

use super::collaborators::{JoinBuilder, RelationCatalog};
use super::join_tree::{singleton, JoinTree, RelMask};
use crate::config::JoinPolicy;
use crate::{Error, Result};
use tracing::{debug, trace};

/// Relations joined so far, with the indices they cover
#[derive(Debug, Clone, PartialEq)]
pub struct Clump<R> {
    pub relation: R,
    pub mask: RelMask,
}

/// Fully materialized plan for the host planner
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedPlan<R> {
    pub relation: R,
    pub mask: RelMask,
    /// Successful `JoinBuilder::join` calls that produced `relation`
    pub joins_built: usize,
}

pub struct PlanReconstructor<'a, C: ?Sized, B: ?Sized> {
    catalog: &'a C,
    builder: &'a B,
    policy: JoinPolicy,
}

impl<'a, C, B> PlanReconstructor<'a, C, B>
where
    C: RelationCatalog + ?Sized,
    B: JoinBuilder<C::Relation> + ?Sized,
{
    pub fn new(catalog: &'a C, builder: &'a B, policy: JoinPolicy) -> Self {
        Self {
            catalog,
            builder,
            policy,
        }
    }

    /// Materialize `tree`, failing with [`Error::ReconstructionIncomplete`]
    /// if the builder leaves more than one fragment.
    ///
    /// Under [`JoinPolicy::DesirableOnly`] pairs the builder finds
    /// undesirable are deferred during the walk; whatever is still apart at
    /// the end is then merged without the desirability check.
    pub fn reconstruct(&self, tree: &JoinTree) -> Result<MaterializedPlan<C::Relation>> {
        let mut joins_built = 0;
        let gated = self.policy == JoinPolicy::DesirableOnly;
        let mut clumps = self.build(tree, gated, &mut joins_built)?;

        if gated && clumps.len() > 1 {
            debug!(fragments = clumps.len(), "forcing deferred clumps together");
            let deferred = std::mem::take(&mut clumps);
            for clump in deferred {
                self.merge_clump(&mut clumps, clump, false, &mut joins_built)?;
            }
        }

        if clumps.len() != 1 {
            debug!(
                fragments = clumps.len(),
                joins_built, "reconstruction left unmerged fragments"
            );
            return Err(Error::ReconstructionIncomplete {
                fragments: clumps.len(),
            });
        }

        match clumps.pop() {
            Some(Clump { relation, mask }) => Ok(MaterializedPlan {
                relation,
                mask,
                joins_built,
            }),
            None => Err(Error::ReconstructionIncomplete { fragments: 0 }),
        }
    }

    fn build(
        &self,
        tree: &JoinTree,
        gated: bool,
        joins_built: &mut usize,
    ) -> Result<Vec<Clump<C::Relation>>> {
        match tree {
            JoinTree::Leaf { relation } => {
                let rel = self
                    .catalog
                    .relation(*relation)
                    .ok_or(Error::UnknownRelation(*relation))?;
                Ok(vec![Clump {
                    relation: rel,
                    mask: singleton(*relation),
                }])
            }
            JoinTree::Join { left, right, .. } => {
                let mut clumps = self.build(left, gated, joins_built)?;
                for clump in self.build(right, gated, joins_built)? {
                    self.merge_clump(&mut clumps, clump, gated, joins_built)?;
                }
                Ok(clumps)
            }
        }
    }

    /// Merge `new_clump` into `clumps`. `gated` consults
    /// [`JoinBuilder::is_desirable`] before each attempt.
    fn merge_clump(
        &self,
        clumps: &mut Vec<Clump<C::Relation>>,
        new_clump: Clump<C::Relation>,
        gated: bool,
        joins_built: &mut usize,
    ) -> Result<()> {
        for i in 0..clumps.len() {
            if let Some(joined) = self.try_join(&clumps[i], &new_clump, gated)? {
                *joins_built += 1;
                clumps.remove(i);
                // The bigger clump may now connect to something it could not
                // reach before.
                return self.merge_clump(clumps, joined, gated, joins_built);
            }
        }
        clumps.push(new_clump);
        Ok(())
    }

    fn try_join(
        &self,
        outer: &Clump<C::Relation>,
        inner: &Clump<C::Relation>,
        gated: bool,
    ) -> Result<Option<Clump<C::Relation>>> {
        if gated && !self.builder.is_desirable(&outer.relation, &inner.relation) {
            trace!(outer = outer.mask, inner = inner.mask, "join deferred as undesirable");
            return Ok(None);
        }

        match self.builder.join(&outer.relation, &inner.relation) {
            Ok(relation) => Ok(Some(Clump {
                relation,
                mask: outer.mask | inner.mask,
            })),
            Err(Error::CollaboratorRefusal(reason)) => {
                trace!(outer = outer.mask, inner = inner.mask, %reason, "join refused");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
