#![allow(dead_code)]

use lightning_join::join_search::admissible::AdmissibleSetEnumerator;
use lightning_join::join_search::constraints::ConstraintGenerator;
use lightning_join::join_search::dp_table::is_valid_rightmost;
use lightning_join::join_search::subset::Subset;
use lightning_join::{JoinTree, Result, ShapeMode};
use std::collections::HashSet;

/// Charges each join node the number of relations below it.
pub fn root_size_cost(tree: &JoinTree) -> Result<f64> {
    match tree {
        JoinTree::Leaf { .. } => Ok(0.0),
        JoinTree::Join { left, right, .. } => Ok((left.size() + right.size()) as f64),
    }
}

pub fn left_deep(order: &[usize]) -> JoinTree {
    let mut tree = JoinTree::leaf(order[0]);
    for &r in &order[1..] {
        tree = JoinTree::join(tree, JoinTree::leaf(r)).unwrap();
    }
    tree
}

pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::new(), &mut vec![false; n], &mut out);
    out
}

/// Left-deep orders a LINEAR worker's table can build: every prefix of two
/// or more relations is admissible and its last relation may go last.
pub fn worker_orders(levels: usize, n_workers: usize, part_id: usize) -> Vec<Vec<usize>> {
    let constraints =
        ConstraintGenerator::new(levels, n_workers, ShapeMode::Linear).generate(part_id);
    let admissible: HashSet<u32> = AdmissibleSetEnumerator::new(levels, ShapeMode::Linear)
        .enumerate(&constraints)
        .iter()
        .map(Subset::mask)
        .collect();

    permutations(levels)
        .into_iter()
        .filter(|order| {
            (2..=order.len()).all(|k| {
                let prefix = Subset::from_members(order[..k].iter().copied());
                admissible.contains(&prefix.mask())
                    && is_valid_rightmost(order[k - 1], &prefix, &constraints)
            })
        })
        .collect()
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}
