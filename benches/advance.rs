//! Advance throughput: plain HashLife vs the streaming engine on a
//! pair of diverging gliders.

use streamlife::{Engine, HyperNode, Index, Leaf, LifeTree, StreamTree};

fn main() {
    divan::main();
}

/// Cells of the benchmark pattern: a south-east glider and a north-west
/// glider on disjoint diagonal lanes.
fn pattern_cells() -> Vec<(i64, i64)> {
    let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
    let mut cells: Vec<(i64, i64)> = glider.to_vec();
    cells.extend(glider.iter().map(|&(x, y)| (100 - x, 30 - y)));
    cells
}

fn build(tree: &mut LifeTree, cells: &[(i64, i64)], depth: u32, ox: i64, oy: i64) -> Index {
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
        build(tree, &inside, depth - 1, ox, oy),
        build(tree, &inside, depth - 1, ox + h, oy),
        build(tree, &inside, depth - 1, ox, oy + h),
        build(tree, &inside, depth - 1, ox + h, oy + h),
    ];
    tree.forest_mut().make_nonleaf(depth, key)
}

fn pattern_node(tree: &mut LifeTree) -> HyperNode {
    let cells = pattern_cells();
    HyperNode::new(build(tree, &cells, 4, -128, -128), 4)
}

#[divan::bench]
fn plain_advance_2_16(bencher: divan::Bencher) {
    bencher
        .with_inputs(|| {
            let mut tree = LifeTree::new(1024);
            let node = pattern_node(&mut tree);
            (tree, node)
        })
        .bench_values(|(mut tree, node)| tree.advance(node, 1 << 16).unwrap());
}

#[divan::bench]
fn stream_advance_2_16(bencher: divan::Bencher) {
    bencher
        .with_inputs(|| {
            let mut stream = StreamTree::new(1024);
            let node = pattern_node(stream.tree_mut());
            (stream, node)
        })
        .bench_values(|(mut stream, node)| stream.advance(node, 1 << 16).unwrap());
}
