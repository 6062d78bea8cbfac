//! Filepath: src/tree.rs
//!
//! The plain HashLife engine over a [`Forest`].
//!
//! [`LifeTree`] owns the forest and implements Gosper's algorithm:
//! `iterate_recurse1(node, m, e)` returns the centred half-size node
//! advanced by `m · 2^e` generations, memoizing the result on the node's
//! own table entry. The geometric helpers (pyramid resizing, shifting,
//! boolean composition, population and hashing) live in the submodules.

use ahash::AHashMap;

use crate::forest::Forest;
use crate::kernel;
use crate::kiv::Index;
use crate::leaf::Leaf;
use crate::node::HyperNode;

mod boolean;
mod population;
mod pyramid;
mod shift;

pub use boolean::BoolOp;

/// The plain (single-layer) HashLife engine.
///
/// # Example
///
/// ```rust
/// use streamlife::{Engine, Leaf, LifeTree};
///
/// let mut tree = LifeTree::new(256);
/// let mut leaf = Leaf::default();
/// // A block: still life.
/// leaf.set(7, 7);
/// leaf.set(8, 7);
/// leaf.set(7, 8);
/// leaf.set(8, 8);
/// let index = tree.forest_mut().make_leaf(leaf);
/// let node = tree.forest_mut().make_nonleaf_hn(1, [index, 0, 0, 0]);
///
/// let advanced = tree.advance(node, 64).unwrap();
/// assert_eq!(tree.population(advanced, 1_000_000_007), 4);
/// ```
pub struct LifeTree {
    forest: Forest,
    gc_threshold: u64,
    hash_cache: AHashMap<(Index, u32), u64>,
}

impl LifeTree {
    /// Create an engine with a fresh forest. `max_memory_mib` is the
    /// byte threshold for [`crate::Engine::threshold_gc`], in MiB.
    #[must_use]
    pub fn new(max_memory_mib: u64) -> Self {
        Self {
            forest: Forest::new(),
            gc_threshold: max_memory_mib << 20,
            hash_cache: AHashMap::new(),
        }
    }

    /// The underlying forest.
    #[inline]
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Mutable access to the underlying forest.
    #[inline]
    pub fn forest_mut(&mut self) -> &mut Forest {
        &mut self.forest
    }

    /// The configured byte threshold for threshold collection.
    #[inline]
    #[must_use]
    pub(crate) fn gc_threshold_bytes(&self) -> u64 {
        self.gc_threshold
    }

    pub(crate) fn hash_cache_mut(&mut self) -> &mut AHashMap<(Index, u32), u64> {
        &mut self.hash_cache
    }

    /// The four quadrant leaves of a depth-1 node.
    pub(crate) fn leaf_quads(&self, index: Index) -> [Leaf; 4] {
        let key = self.forest.nonleaf(1, index).key;
        key.map(|i| self.forest.leaf_entry(i).key)
    }

    // ------------------------------------------------------------------
    //  Overlapping children
    // ------------------------------------------------------------------

    /// The nine overlapping half-size children of a non-empty node at
    /// `depth ≥ 2`, row-major: NW, NC, NE, CW, CC, CE, SW, SC, SE. The
    /// five non-corner children are built by interning 4-tuples drawn
    /// from the grandchildren.
    pub(crate) fn ninechildren(&mut self, node: HyperNode) -> [Index; 9] {
        let key = self.forest.nonleaf(node.depth, node.index).key;
        let d = node.depth - 1;
        let nw = self.forest.nonleaf(d, key[0]).key;
        let ne = self.forest.nonleaf(d, key[1]).key;
        let sw = self.forest.nonleaf(d, key[2]).key;
        let se = self.forest.nonleaf(d, key[3]).key;

        let cc = [nw[3], ne[2], sw[1], se[0]];
        let nc = [nw[1], ne[0], nw[3], ne[2]];
        let sc = [sw[1], se[0], sw[3], se[2]];
        let cw = [nw[2], nw[3], sw[0], sw[1]];
        let ce = [ne[2], ne[3], se[0], se[1]];

        [
            key[0],
            self.forest.make_nonleaf(d, nc),
            key[1],
            self.forest.make_nonleaf(d, cw),
            self.forest.make_nonleaf(d, cc),
            self.forest.make_nonleaf(d, ce),
            key[2],
            self.forest.make_nonleaf(d, sc),
            key[3],
        ]
    }

    /// Regroup nine advanced fragments into the four overlapping
    /// sub-quadrants, interned at `depth`.
    pub(crate) fn fourchildren(&mut self, depth: u32, frags: &[Index; 9]) -> [Index; 4] {
        [
            self.forest.make_nonleaf(depth, [frags[0], frags[1], frags[3], frags[4]]),
            self.forest.make_nonleaf(depth, [frags[1], frags[2], frags[4], frags[5]]),
            self.forest.make_nonleaf(depth, [frags[3], frags[4], frags[6], frags[7]]),
            self.forest.make_nonleaf(depth, [frags[4], frags[5], frags[7], frags[8]]),
        ]
    }

    // ------------------------------------------------------------------
    //  HashLife recursion
    // ------------------------------------------------------------------

    /// Advance a single-layer node by `mantissa · 2^exponent` generations
    /// and return the centred half-size result, one depth down.
    ///
    /// `mantissa ∈ 0..=8`; 0 means "project to the centred child without
    /// advancing", which the pyramid logic requires. The result is
    /// memoized on the node's entry (`res` plus the flags descriptor)
    /// except for the projection case.
    pub fn iterate_recurse1(&mut self, node: HyperNode, mantissa: u64, exponent: u64) -> HyperNode {
        debug_assert!(node.depth >= 1, "cannot iterate a leaf");
        debug_assert!(node.index2 == 0, "dual-layer nodes take the streaming path");
        debug_assert!(mantissa <= kernel::MAX_STEP);

        if node.index == 0 {
            return HyperNode::new(0, node.depth - 1);
        }

        if mantissa != 0 {
            let entry = self.forest.nonleaf(node.depth, node.index);
            if entry.flags.res_matches(mantissa, exponent, node.depth) {
                return HyperNode::new(entry.value.res, node.depth - 1);
            }
        }

        if node.depth == 1 {
            // Base case: a 32×32 square built from four leaves.
            let quads = self.leaf_quads(node.index);
            let result = self.forest.make_leaf(kernel::step_leaf(mantissa, &quads));

            if mantissa != 0 {
                let entry = self.forest.nonleaf_mut(1, node.index);
                entry.value.res = result;
                entry.flags.set_res(mantissa, exponent);
            }
            return HyperNode::new(result, 0);
        }

        let mut frags = self.ninechildren(node);
        if mantissa == 0 {
            return HyperNode::new(frags[4], node.depth - 1);
        }

        // One stage if the desired time fits below this depth, else two:
        // the first pass advances the nine children, the second the four
        // regrouped quadrants.
        let both_stages = u64::from(node.depth) <= 1 + exponent;
        let first_mantissa = if both_stages { mantissa } else { 0 };
        for frag in &mut frags {
            *frag = self
                .iterate_recurse1(HyperNode::new(*frag, node.depth - 1), first_mantissa, exponent)
                .index;
        }

        let mut quads = self.fourchildren(node.depth - 1, &frags);
        for quad in &mut quads {
            *quad = self
                .iterate_recurse1(HyperNode::new(*quad, node.depth - 1), mantissa, exponent)
                .index;
        }

        let result = self.forest.make_nonleaf(node.depth - 1, quads);
        let entry = self.forest.nonleaf_mut(node.depth, node.index);
        entry.value.res = result;
        entry.flags.set_res(mantissa, exponent);
        HyperNode::new(result, node.depth - 1)
    }
}

// ============================================================================
//  Tests
// ============================================================================
