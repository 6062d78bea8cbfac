//! Shared helpers for the integration suites: building nodes from cell
//! lists and reading them back, in centre-relative coordinates.

#![allow(dead_code)]

use std::collections::BTreeSet;

use streamlife::{HyperNode, Index, Leaf, LifeTree};

/// Cells of a south-east-bound glider with its north-west bounding
/// corner at `(x, y)`, centre-relative.
pub fn glider_cells(x: i64, y: i64) -> Vec<(i64, i64)> {
    [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]
        .into_iter()
        .map(|(dx, dy)| (x + dx, y + dy))
        .collect()
}

/// Translate a cell set.
pub fn shifted(cells: &BTreeSet<(i64, i64)>, dx: i64, dy: i64) -> BTreeSet<(i64, i64)> {
    cells.iter().map(|&(x, y)| (x + dx, y + dy)).collect()
}

/// Build the smallest node (depth ≥ 1) containing `cells`, given in
/// coordinates relative to the node centre.
pub fn node_from_cells(tree: &mut LifeTree, cells: &[(i64, i64)]) -> HyperNode {
    let extent = cells
        .iter()
        .map(|&(x, y)| x.max(-x - 1).max(y).max(-y - 1))
        .max()
        .unwrap_or(0);
    let mut depth = 1;
    while 16i64 << (depth - 1) <= extent {
        depth += 1;
    }
    let half = 8i64 << depth;
    let index = assemble(tree, cells, depth, -half, -half);
    HyperNode::new(index, depth)
}

fn assemble(tree: &mut LifeTree, cells: &[(i64, i64)], depth: u32, ox: i64, oy: i64) -> Index {
    let side = 16i64 << depth;
    let inside: Vec<(i64, i64)> = cells
        .iter()
        .copied()
        .filter(|&(x, y)| (ox..ox + side).contains(&x) && (oy..oy + side).contains(&y))
        .collect();
    if inside.is_empty() {
        return 0;
    }
    if depth == 0 {
        let mut leaf = Leaf::default();
        for (x, y) in inside {
            leaf.set((x - ox) as u64, (y - oy) as u64);
        }
        return tree.forest_mut().make_leaf(leaf);
    }
    let h = side / 2;
    let key = [
        assemble(tree, &inside, depth - 1, ox, oy),
        assemble(tree, &inside, depth - 1, ox + h, oy),
        assemble(tree, &inside, depth - 1, ox, oy + h),
        assemble(tree, &inside, depth - 1, ox + h, oy + h),
    ];
    tree.forest_mut().make_nonleaf(depth, key)
}

/// Every live cell of `node`, centre-relative. Dual-layer nodes are
/// merged first.
pub fn live_cells(tree: &mut LifeTree, node: HyperNode) -> BTreeSet<(i64, i64)> {
    let node = tree.breach(node);
    let side = 16i64 << node.depth;
    let half = side / 2;
    let mut cells = BTreeSet::new();
    for y in 0..side {
        for x in 0..side {
            if tree.get_cell(node, x as u64, y as u64) {
                cells.insert((x - half, y - half));
            }
        }
    }
    cells
}
