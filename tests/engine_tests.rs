//! End-to-end scenarios for the plain engine: known patterns, the
//! algebraic laws advancing must respect, and the root handle API.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use common::{glider_cells, live_cells, node_from_cells, shifted};
use streamlife::{BoolOp, Engine, EngineError, HyperNode, LifeTree};

const PRIME: u32 = 1_000_000_007;

// ============================================================================
//  Known patterns
// ============================================================================

#[test]
fn test_block_is_a_still_life() {
    let mut tree = LifeTree::new(256);
    let block = node_from_cells(&mut tree, &[(0, 0), (1, 0), (0, 1), (1, 1)]);

    let once = tree.advance(block, 1).unwrap();
    let many = tree.advance(block, 1024).unwrap();

    assert_eq!(once, block);
    assert_eq!(many, block);
    assert_eq!(tree.population(block, PRIME), 4);
}

#[test]
fn test_glider_translates_with_period_four() {
    let mut tree = LifeTree::new(256);
    let glider = node_from_cells(&mut tree, &glider_cells(-2, -2));
    let cells = live_cells(&mut tree, glider);

    // One period shifts the glider one cell south-east, nothing else.
    let advanced = tree.advance(glider, 4).unwrap();
    assert_eq!(live_cells(&mut tree, advanced), shifted(&cells, 1, 1));

    // Population is 5 at every intermediate generation.
    for t in 0..=8 {
        let at_t = tree.advance(glider, t).unwrap();
        assert_eq!(tree.population(at_t, PRIME), 5, "generation {t}");
    }
}

#[test]
fn test_empty_universe_is_a_fixed_point() {
    let mut tree = LifeTree::new(256);
    let empty = HyperNode::new(0, 1);

    for steps in [1, 2, 1 << 10, 1 << 20] {
        let advanced = tree.advance(empty, steps).unwrap();
        assert_eq!(advanced, empty, "steps {steps}");
        assert_eq!(tree.population(advanced, PRIME), 0);
    }
}

#[test]
fn test_blinker_has_period_two() {
    let mut tree = LifeTree::new(256);
    let blinker = node_from_cells(&mut tree, &[(-1, 0), (0, 0), (1, 0)]);

    let once = tree.advance(blinker, 1).unwrap();
    let twice = tree.advance(blinker, 2).unwrap();

    assert_ne!(once, blinker);
    assert_eq!(twice, blinker);
    assert_eq!(tree.population(once, PRIME), 3);
}

#[test]
fn test_r_pentomino_stabilizes_to_known_population() {
    let mut tree = LifeTree::new(256);
    // The r-pentomino settles after 1103 generations at 116 cells.
    let cells = [(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)];
    let node = node_from_cells(&mut tree, &cells);

    let settled = tree.advance(node, 1103).unwrap();
    assert_eq!(tree.population(settled, PRIME), 116);

    let later = tree.advance(settled, 240).unwrap();
    assert_eq!(tree.population(later, PRIME), 116);
}

// ============================================================================
//  Laws
// ============================================================================

#[test]
fn test_advance_composes() {
    let mut tree = LifeTree::new(256);
    let node = node_from_cells(&mut tree, &glider_cells(0, 0));

    let split = {
        let mid = tree.advance(node, 12).unwrap();
        tree.advance(mid, 20).unwrap()
    };
    let direct = tree.advance(node, 32).unwrap();
    assert_eq!(split, direct);
}

#[test]
fn test_advance_agrees_across_decompositions() {
    let mut tree = LifeTree::new(256);
    let cells = [(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)];
    let node = node_from_cells(&mut tree, &cells);

    // 24 = 8·3 runs as mantissa 8; stepping 3 at a time must agree.
    let mut stepped = node;
    for _ in 0..8 {
        stepped = tree.advance(stepped, 3).unwrap();
    }
    let direct = tree.advance(node, 24).unwrap();
    assert_eq!(stepped, direct);
}

#[test]
fn test_boolean_xor_decomposition_on_universes() {
    let mut tree = LifeTree::new(256);
    let a = node_from_cells(&mut tree, &glider_cells(-8, 0));
    let b = node_from_cells(&mut tree, &[(0, 0), (1, 0), (0, 1), (1, 1)]);

    let xor = tree.boolean_universe(a, b, BoolOp::Xor);
    let or = tree.boolean_universe(a, b, BoolOp::Or);
    let and = tree.boolean_universe(a, b, BoolOp::And);
    let composed = tree.boolean_universe(or, and, BoolOp::AndNot);
    assert_eq!(xor, composed);
}

#[test]
fn test_hash_and_population_stable_across_gc() {
    let mut tree = LifeTree::new(256);
    let node = node_from_cells(&mut tree, &glider_cells(3, -5));
    let handle = tree.new_handle(node);

    let hash_before = tree.hash(node);
    let pop_before = tree.population(node, PRIME);

    tree.force_gc();

    let node = tree.handle_node(handle).unwrap();
    assert_eq!(tree.hash(node), hash_before);
    assert_eq!(tree.population(node, PRIME), pop_before);
}

// ============================================================================
//  Handles and errors
// ============================================================================

#[test]
fn test_handle_api() {
    let mut tree = LifeTree::new(256);
    let node = node_from_cells(&mut tree, &[(-1, 0), (0, 0), (1, 0)]);

    let handle = tree.new_handle(node);
    assert_ne!(handle, 0);

    let advanced = tree.advance_handle(handle, 2).unwrap();
    assert_eq!(advanced, node);

    tree.delete_handle(handle).unwrap();
    assert_eq!(
        tree.advance_handle(handle, 1),
        Err(EngineError::InvalidHandle(handle))
    );
}

#[test]
fn test_unrooted_work_is_reclaimed() {
    let mut tree = LifeTree::new(256);
    let node = node_from_cells(&mut tree, &glider_cells(0, 0));
    let handle = tree.new_handle(node);
    let _ = tree.advance(node, 64).unwrap();

    let before = tree.forest().layer_len(0);
    tree.force_gc();
    let after = tree.forest().layer_len(0);
    assert!(after < before, "advancing left garbage ({before} -> {after})");

    // The rooted pattern itself is intact.
    let node = tree.handle_node(handle).unwrap();
    assert_eq!(tree.population(node, PRIME), 5);
}
