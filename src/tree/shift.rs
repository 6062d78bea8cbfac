//! Filepath: src/tree/shift.rs
//!
//! Rigid translation of a toroidal universe.
//!
//! `shift_recurse` moves content by the sub-cell fraction
//! `(x / 2^exponent, y / 2^exponent)` of a node side, reselecting
//! children-of-children at each depth; the callers first pyramid the
//! universe up far enough that toroidal wraparound coincides with an
//! unbounded shift.

use ahash::AHashMap;

use crate::kernel;
use crate::kiv::Index;
use crate::node::HyperNode;
use crate::tree::LifeTree;

impl LifeTree {
    /// Shift `node` by `(x, y) / 2^exponent` of its side, returning the
    /// north-west-anchored half-size window of the result, one depth
    /// down.
    ///
    /// `x` and `y` are wrapped (two's-complement) displacements.
    /// Depth-0 inputs are invalid operands and yield the invalid
    /// sentinel.
    pub fn shift_recurse(
        &mut self,
        node: HyperNode,
        x: u64,
        y: u64,
        exponent: u64,
        memo: &mut AHashMap<(Index, u32), Index>,
    ) -> HyperNode {
        if node.index2 != 0 {
            let merged = self.breach(node);
            return self.shift_recurse(merged, x, y, exponent, memo);
        }
        if node.depth == 0 {
            return HyperNode::invalid();
        }
        if node.index == 0 {
            return HyperNode::new(0, node.depth - 1);
        }
        if let Some(&cached) = memo.get(&(node.index, node.depth)) {
            return HyperNode::new(cached, node.depth - 1);
        }

        let key = self.forest().nonleaf(node.depth, node.index).key;

        if u64::from(node.depth) + 2 < exponent {
            // The displacement is zero at this scale: the window is the
            // north-west child itself.
            memo.insert((node.index, node.depth), key[0]);
            return HyperNode::new(key[0], node.depth - 1);
        }

        if node.depth > 1 {
            // Sign-extended selection of the displacement bit at this
            // scale.
            let bs = (u64::from(node.depth) + 2 - exponent).min(63);
            let tx = (x >> bs) & 1;
            let ty = (y >> bs) & 1;

            let d = node.depth - 1;
            let nw = self.forest().nonleaf(d, key[0]).key;
            let ne = self.forest().nonleaf(d, key[1]).key;
            let sw = self.forest().nonleaf(d, key[2]).key;
            let se = self.forest().nonleaf(d, key[3]).key;

            // Reselect the four half-offset children covering the shifted
            // window.
            let (nw2, ne2, sw2, se2) = match (ty, tx) {
                (1, 1) => (
                    [nw[3], ne[2], sw[1], se[0]],
                    [ne[2], ne[3], se[0], se[1]],
                    [sw[1], se[0], sw[3], se[2]],
                    [se[0], se[1], se[2], se[3]],
                ),
                (1, 0) => (
                    [nw[2], nw[3], sw[0], sw[1]],
                    [nw[3], ne[2], sw[1], se[0]],
                    [sw[0], sw[1], sw[2], sw[3]],
                    [sw[1], se[0], sw[3], se[2]],
                ),
                (0, 1) => (
                    [nw[1], ne[0], nw[3], ne[2]],
                    [ne[0], ne[1], ne[2], ne[3]],
                    [nw[3], ne[2], sw[1], se[0]],
                    [ne[2], ne[3], se[0], se[1]],
                ),
                _ => (
                    [nw[0], nw[1], nw[2], nw[3]],
                    [nw[1], ne[0], nw[3], ne[2]],
                    [nw[2], nw[3], sw[0], sw[1]],
                    [nw[3], ne[2], sw[1], se[0]],
                ),
            };

            let xnw = self.forest_mut().make_nonleaf_hn(d, nw2);
            let xne = self.forest_mut().make_nonleaf_hn(d, ne2);
            let xsw = self.forest_mut().make_nonleaf_hn(d, sw2);
            let xse = self.forest_mut().make_nonleaf_hn(d, se2);

            let ynw = self.shift_recurse(xnw, x, y, exponent, memo).index;
            let yne = self.shift_recurse(xne, x, y, exponent, memo).index;
            let ysw = self.shift_recurse(xsw, x, y, exponent, memo).index;
            let yse = self.shift_recurse(xse, x, y, exponent, memo).index;

            let out = self.forest_mut().make_nonleaf_hn(d, [ynw, yne, ysw, yse]);
            memo.insert((node.index, node.depth), out.index);
            return out;
        }

        // 32×32 base case: bit-level shift of the assembled rows.
        let tx = if exponent < 4 { ((x << exponent) & 15) as usize } else { 0 };
        let ty = if exponent < 4 { ((y << exponent) & 15) as usize } else { 0 };
        let quads = self.leaf_quads(node.index);
        let result = self.forest_mut().make_leaf(kernel::shift_leaf32(&quads, tx, ty));
        memo.insert((node.index, node.depth), result);
        HyperNode::new(result, 0)
    }

    /// Rigidly shift a toroidal universe by `(x, y) / 2^exponent` of a
    /// node side, returning a node of the same depth.
    pub fn shift_toroidal(&mut self, node: HyperNode, x: i64, y: i64, exponent: u64) -> HyperNode {
        let node = self.breach(node);
        if x == 0 && y == 0 {
            return node;
        }

        let mut sx = x;
        let mut sy = y;
        let mut sz = exponent;
        while sx & 1 == 0 && sy & 1 == 0 {
            sx /= 2;
            sy /= 2;
            sz += 1;
        }

        // Tile the torus 2×2 so the half-size window below always exists.
        let tiled = self
            .forest_mut()
            .make_nonleaf_hn(node.depth + 1, [node.index; 4]);

        let ux = sx.wrapping_neg() as u64;
        let uy = sy.wrapping_neg() as u64;
        let mut memo = AHashMap::new();
        self.shift_recurse(tiled, ux, uy, sz, &mut memo)
    }

    /// Shift an unbounded universe by whole cells scaled by
    /// `2^-exponent`, growing the pyramid first so wraparound cannot be
    /// observed, and normalizing afterwards.
    pub fn shift_universe(&mut self, node: HyperNode, x: i64, y: i64, exponent: u64) -> HyperNode {
        let mut node = node;
        if x != 0 || y != 0 {
            let diameter = x.unsigned_abs().max(y.unsigned_abs());
            let bits = 64 - diameter.leading_zeros();
            node = self.pyramid_up_to(node, bits + exponent as u32);
            node = self.pyramid_up(node);
            node = self.shift_toroidal(node, x, y, exponent);
        }
        self.pyramid_down(node)
    }
}

// ============================================================================
//  Tests
// ============================================================================
