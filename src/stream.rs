//! Filepath: src/stream.rs
//!
//! The streaming engine: HashLife over dual-layer nodes.
//!
//! A configuration is split into two sublayers ("Beszel" and "Ulqoma").
//! When lane analysis proves the sublayers translate along disjoint
//! lanes in opposing direction families, they cannot interact over the
//! next step and each is advanced independently by the plain recursion —
//! turning, say, a glider stream crossing a stationary circuit into two
//! cheap independent histories. Interacting pairs fall back to a paired
//! Gosper recursion memoized in a dedicated bi-result table.

use crate::engine::Engine;
use crate::kiv::{Index, KivTable};
use crate::lanes::{self, Lanes, COMPUTED, EMPTY_LANES, VISIBLE};
use crate::node::{HyperNode, NodeKey};
use crate::tracing_helpers::{debug_log, info_log};
use crate::tree::LifeTree;

/// The streaming HashLife engine.
///
/// Wraps a [`LifeTree`] and overrides iteration with the paired
/// recursion; everything else (geometry, I/O, population) delegates to
/// the plain engine over the shared forest.
pub struct StreamTree {
    tree: LifeTree,
    /// Memo table for the paired recursion. Keyed by both sublayer
    /// indices, the depth, and the encoded step; holds both result
    /// indices. Emptied by every collection, since its entries are not
    /// roots.
    biresults: KivTable<NodeKey, [Index; 2]>,
}

impl StreamTree {
    /// Create a streaming engine with a fresh forest. `max_memory_mib`
    /// is the byte threshold for [`crate::Engine::threshold_gc`], in
    /// MiB.
    #[must_use]
    pub fn new(max_memory_mib: u64) -> Self {
        Self {
            tree: LifeTree::new(max_memory_mib),
            biresults: KivTable::new(),
        }
    }

    // ------------------------------------------------------------------
    //  Lane analysis
    // ------------------------------------------------------------------

    /// The lane descriptor of a node, computed on demand and cached in
    /// its entry. Index 0 admits every direction and occupies no lanes.
    pub fn node_lanes(&mut self, index: Index, depth: u32) -> Lanes {
        Lanes(self.node_lanes_raw(index, depth))
    }

    fn node_lanes_raw(&mut self, index: Index, depth: u32) -> u64 {
        if index == 0 {
            return EMPTY_LANES;
        }

        if depth == 0 {
            let entry = self.tree.forest().leaf_entry(index);
            if entry.value.lanes & 0xffff_0000 != COMPUTED {
                let computed = lanes::leaf_direction(&entry.key) | COMPUTED;
                self.tree.forest_mut().leaf_entry_mut(index).value.lanes = computed;
            }
            return self.tree.forest().leaf_entry(index).value.lanes & VISIBLE;
        }

        if self.tree.forest().nonleaf(depth, index).value.lanes & 0xffff_0000 == COMPUTED {
            return self.tree.forest().nonleaf(depth, index).value.lanes & VISIBLE;
        }

        let key = self.tree.forest().nonleaf(depth, index).key;
        let mut child_lanes = [0u64; 9];
        let mut adml: u64 = 0xff;

        // Short-circuit on the corner children: most non-translating
        // content is rejected before the overlap children are built.
        for (slot, child) in [(0, key[0]), (2, key[1]), (6, key[2]), (8, key[3])] {
            child_lanes[slot] = self.node_lanes_raw(child, depth - 1);
            adml &= child_lanes[slot];
            if adml == 0 {
                self.tree.forest_mut().nonleaf_mut(depth, index).value.lanes = COMPUTED;
                return 0;
            }
        }

        // The five overlap children, exactly as in the Gosper stage.
        let overlaps: [Index; 5] = if depth == 1 {
            let [nw, ne, sw, se] = self.tree.leaf_quads(index).map(|leaf| leaf.words());
            let nc = [nw[1], ne[0], nw[3], ne[2]];
            let cw = [nw[2], nw[3], sw[0], sw[1]];
            let cc = [nw[3], ne[2], sw[1], se[0]];
            let ce = [ne[2], ne[3], se[0], se[1]];
            let sc = [sw[1], se[0], sw[3], se[2]];
            [nc, cw, cc, ce, sc]
                .map(|words| self.tree.forest_mut().make_leaf(crate::leaf::Leaf::from_words(words)))
        } else {
            let d = depth - 1;
            let nw = self.tree.forest().nonleaf(d, key[0]).key;
            let ne = self.tree.forest().nonleaf(d, key[1]).key;
            let sw = self.tree.forest().nonleaf(d, key[2]).key;
            let se = self.tree.forest().nonleaf(d, key[3]).key;
            let nc = [nw[1], ne[0], nw[3], ne[2]];
            let cw = [nw[2], nw[3], sw[0], sw[1]];
            let cc = [nw[3], ne[2], sw[1], se[0]];
            let ce = [ne[2], ne[3], se[0], se[1]];
            let sc = [sw[1], se[0], sw[3], se[2]];
            [nc, cw, cc, ce, sc].map(|k| self.tree.forest_mut().make_nonleaf(d, k))
        };

        for (slot, overlap) in [1, 3, 4, 5, 7].into_iter().zip(overlaps) {
            child_lanes[slot] = self.node_lanes_raw(overlap, depth - 1);
            adml &= child_lanes[slot];
        }

        let lanes = if adml == 0 { 0 } else { Self::fold_lane_masks(adml, &child_lanes, depth) };
        let packed = adml | COMPUTED | (lanes << 32);
        self.tree.forest_mut().nonleaf_mut(depth, index).value.lanes = packed;
        packed & VISIBLE
    }

    /// OR the children's lane masks into the parent's, rotating each by
    /// its position within the parent. Lane numbers are modulo 32 in
    /// 8-cell units, so a child a half-node away sits `2^(depth-1)`
    /// lanes off axis — nothing rotates once the offset wraps past 32.
    fn fold_lane_masks(adml: u64, child_lanes: &[u64; 9], depth: u32) -> u64 {
        let cl: [u64; 9] = std::array::from_fn(|i| child_lanes[i] >> 32);

        let rotl = |x: u64, n: u64| (x << n | x >> (32 - n)) & 0xffff_ffff;
        let rotr = |x: u64, n: u64| (x >> n | x << (32 - n)) & 0xffff_ffff;

        let a = if depth < 6 { 1 << (depth - 1) } else { 0 };
        let a2 = (2 * a) & 31;
        let mut lanes = 0u64;

        if adml & 0x88 != 0 {
            // Horizontal lanes: rows shift with the vertical position.
            lanes |= rotl(cl[0] | cl[1] | cl[2], a);
            lanes |= cl[3] | cl[4] | cl[5];
            lanes |= rotr(cl[6] | cl[7] | cl[8], a);
        }

        if adml & 0x44 != 0 {
            // Anti-diagonal lanes.
            lanes |= rotl(cl[0], a2);
            lanes |= rotl(cl[3] | cl[1], a);
            lanes |= cl[6] | cl[4] | cl[2];
            lanes |= rotr(cl[7] | cl[5], a);
            lanes |= rotr(cl[8], a2);
        }

        if adml & 0x22 != 0 {
            // Vertical lanes: columns shift with the horizontal position.
            lanes |= rotl(cl[0] | cl[3] | cl[6], a);
            lanes |= cl[1] | cl[4] | cl[7];
            lanes |= rotr(cl[2] | cl[5] | cl[8], a);
        }

        if adml & 0x11 != 0 {
            // Main-diagonal lanes.
            lanes |= rotl(cl[2], a2);
            lanes |= rotl(cl[1] | cl[5], a);
            lanes |= cl[0] | cl[4] | cl[8];
            lanes |= rotr(cl[3] | cl[7], a);
            lanes |= rotr(cl[6], a2);
        }

        lanes
    }

    /// Whether the two sublayers of `node` provably cannot interact over
    /// the next step: both translate, they share a direction family
    /// (one's outbound is the other's inbound), and their lane masks are
    /// disjoint.
    pub fn is_solitonic(&mut self, node: HyperNode) -> bool {
        let lanes1 = self.node_lanes_raw(node.index, node.depth);
        if lanes1 & 0xff == 0 {
            return false;
        }
        let lanes2 = self.node_lanes_raw(node.index2, node.depth);
        if lanes2 & 0xff == 0 {
            return false;
        }
        if (lanes1 & lanes2) >> 32 != 0 {
            return false;
        }
        (((lanes1 >> 4) & lanes2) | ((lanes2 >> 4) & lanes1)) & 15 != 0
    }

    // ------------------------------------------------------------------
    //  Paired recursion
    // ------------------------------------------------------------------

    /// Sort a merged single-layer result into the Beszel or Ulqoma slot
    /// of a dual-layer node, by the direction family of its source.
    fn sort_by_family(&mut self, source: Index, result: Index, depth: u32) -> HyperNode {
        if self.node_lanes(source, depth + 1).is_ulqoma_family() {
            HyperNode::dual(0, result, depth)
        } else {
            HyperNode::dual(result, 0, depth)
        }
    }

    /// Paired [`LifeTree::iterate_recurse1`]: advance both sublayers of
    /// `node` by `mantissa · 2^exponent` generations, returning the
    /// centred half-size dual-layer node.
    pub fn iterate_recurse_pair(
        &mut self,
        node: HyperNode,
        mantissa: u64,
        exponent: u64,
    ) -> HyperNode {
        if self.is_solitonic(node) {
            // The sublayers provably cannot interact: advance each
            // independently through the plain recursion.
            let i1 = self.tree.iterate_recurse1(node.beszel(), mantissa, exponent).index;
            let i2 = self.tree.iterate_recurse1(node.ulqoma(), mantissa, exponent).index;

            if node.index == 0 || node.index2 == 0 {
                // Exactly one sublayer is populated; keep it in the slot
                // matching its direction family. The index OR is sound
                // only because the other side is zero.
                let result = i1 | i2;
                let source = node.index | node.index2;
                return self.sort_by_family(source, result, node.depth - 1);
            }
            return HyperNode::dual(i1, i2, node.depth - 1);
        }

        // Both-stages saturation makes the encoded exponent reusable by
        // any query that also collapses both Gosper stages.
        let effective_exp = u64::from(node.depth).min(1 + exponent);
        let key: NodeKey = [
            node.index,
            node.index2,
            node.depth,
            ((effective_exp << 4) | mantissa) as Index,
        ];
        if let Some(i) = self.biresults.lookup(&key) {
            let [r1, r2] = self.biresults.entry(i).value;
            return HyperNode::dual(r1, r2, node.depth - 1);
        }

        let result = if node.depth == 1 {
            // Base case: collapse to one layer, advance it, and re-sort
            // the output by its lane family.
            let merged = self.tree.breach(node);
            let advanced = self.tree.iterate_recurse1(merged, mantissa, exponent).index;
            if advanced == 0 {
                [0, 0]
            } else {
                let sorted = self.sort_by_family(merged.index, advanced, 0);
                [sorted.index, sorted.index2]
            }
        } else {
            let mut frags1 = self.tree.ninechildren(node.beszel());
            let mut frags2 = self.tree.ninechildren(node.ulqoma());

            if mantissa == 0 {
                [frags1[4], frags2[4]]
            } else {
                let both_stages = u64::from(node.depth) <= 1 + exponent;
                for i in 0..9 {
                    if both_stages {
                        let advanced = self.iterate_recurse_pair(
                            HyperNode::dual(frags1[i], frags2[i], node.depth - 1),
                            mantissa,
                            exponent,
                        );
                        frags1[i] = advanced.index;
                        frags2[i] = advanced.index2;
                    } else {
                        frags1[i] = self.centred_child(frags1[i], node.depth - 1);
                        frags2[i] = self.centred_child(frags2[i], node.depth - 1);
                    }
                }

                let mut quads1 = self.tree.fourchildren(node.depth - 1, &frags1);
                let mut quads2 = self.tree.fourchildren(node.depth - 1, &frags2);
                for i in 0..4 {
                    let advanced = self.iterate_recurse_pair(
                        HyperNode::dual(quads1[i], quads2[i], node.depth - 1),
                        mantissa,
                        exponent,
                    );
                    quads1[i] = advanced.index;
                    quads2[i] = advanced.index2;
                }

                [
                    self.tree.forest_mut().make_nonleaf(node.depth - 1, quads1),
                    self.tree.forest_mut().make_nonleaf(node.depth - 1, quads2),
                ]
            }
        };

        self.biresults.set(&key, result);
        HyperNode::dual(result[0], result[1], node.depth - 1)
    }

    /// The centred child of a node at `depth`, one level down, without
    /// advancing time.
    fn centred_child(&mut self, index: Index, depth: u32) -> Index {
        if index == 0 {
            return 0;
        }
        if depth == 1 {
            let [nw, ne, sw, se] = self.tree.leaf_quads(index).map(|leaf| leaf.words());
            let centre = crate::leaf::Leaf::from_words([nw[3], ne[2], sw[1], se[0]]);
            return self.tree.forest_mut().make_leaf(centre);
        }
        let key = self.tree.forest().nonleaf(depth, index).key;
        let d = depth - 1;
        let centre = [
            self.tree.forest().nonleaf(d, key[0]).key[3],
            self.tree.forest().nonleaf(d, key[1]).key[2],
            self.tree.forest().nonleaf(d, key[2]).key[1],
            self.tree.forest().nonleaf(d, key[3]).key[0],
        ];
        self.tree.forest_mut().make_nonleaf(d, centre)
    }

    /// Bytes held by the bi-result table.
    #[must_use]
    pub fn biresult_bytes(&self) -> u64 {
        self.biresults.total_bytes()
    }
}

// ============================================================================
//  Engine
// ============================================================================

impl Engine for StreamTree {
    fn tree(&self) -> &LifeTree {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut LifeTree {
        &mut self.tree
    }

    fn iterate_recurse(&mut self, node: HyperNode, mantissa: u64, exponent: u64) -> HyperNode {
        self.iterate_recurse_pair(node, mantissa, exponent)
    }

    fn threshold_gc_bytes(&mut self, threshold: u64) -> bool {
        if self.tree.forest_mut().gc_partial() {
            // The collection invalidated the bi-result indices.
            self.biresults.clear();
            return true;
        }

        if threshold != 0 {
            let old_size = self.tree.forest().total_bytes() + self.biresults.total_bytes();
            if old_size >= threshold {
                info_log!(old_size, threshold, "emptying streaming bi-result table");
                self.biresults.clear();
                let mut new_size = self.tree.forest().total_bytes() + self.biresults.total_bytes();
                if new_size >= threshold / 4 * 3 {
                    debug_log!("insufficient memory liberated; collecting the forest");
                    self.tree.forest_mut().gc_full(0);
                    new_size = self.tree.forest().total_bytes() + self.biresults.total_bytes();
                }
                info_log!(from_bytes = old_size, to_bytes = new_size, "streaming memory reduced");
                return true;
            }
        }
        false
    }

    fn force_gc(&mut self) {
        // The bi-result table holds unrooted indices: empty it before
        // the forest sweep can reclaim them.
        self.biresults.clear();
        self.tree.forest_mut().gc_full(0);
    }
}

// ============================================================================
//  Tests
// ============================================================================
