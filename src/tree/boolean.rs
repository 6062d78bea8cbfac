//! Filepath: src/tree/boolean.rs
//!
//! Boolean composition of universes, and the dual→single collapse.

use ahash::AHashMap;

use crate::kiv::Index;
use crate::leaf::Leaf;
use crate::node::HyperNode;
use crate::tree::LifeTree;

/// Word-wise boolean operation on matching quadrants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoolOp {
    And,
    Or,
    Xor,
    /// `a & !b`.
    AndNot,
}

impl BoolOp {
    #[inline]
    const fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
            Self::AndNot => a & !b,
        }
    }

    /// The result when the left operand is entirely dead.
    #[inline]
    const fn left_empty(self, left: HyperNode, right: HyperNode) -> HyperNode {
        match self {
            Self::And | Self::AndNot => left,
            Self::Or | Self::Xor => right,
        }
    }

    /// The result when the right operand is entirely dead.
    #[inline]
    const fn right_empty(self, left: HyperNode, right: HyperNode) -> HyperNode {
        match self {
            Self::And => right,
            Self::Or | Self::Xor | Self::AndNot => left,
        }
    }
}

impl LifeTree {
    /// Combine two same-depth nodes cell-wise under `op`.
    pub fn boolean_recurse(&mut self, left: HyperNode, right: HyperNode, op: BoolOp) -> HyperNode {
        let mut memo = AHashMap::new();
        self.boolean_memo(left, right, op, &mut memo)
    }

    fn boolean_memo(
        &mut self,
        left: HyperNode,
        right: HyperNode,
        op: BoolOp,
        memo: &mut AHashMap<((Index, Index), u32), Index>,
    ) -> HyperNode {
        debug_assert_eq!(left.depth, right.depth);

        if left.is_empty() {
            return op.left_empty(left, right);
        }
        if right.is_empty() {
            return op.right_empty(left, right);
        }
        if left.index2 != 0 || right.index2 != 0 {
            let left = self.breach(left);
            let right = self.breach(right);
            return self.boolean_memo(left, right, op, memo);
        }

        if let Some(&cached) = memo.get(&((left.index, right.index), left.depth)) {
            return HyperNode::new(cached, left.depth);
        }

        if left.depth >= 1 {
            let lkey = self.forest().nonleaf(left.depth, left.index).key;
            let rkey = self.forest().nonleaf(right.depth, right.index).key;
            let mut out = [0; 4];
            for n in 0..4 {
                out[n] = self
                    .boolean_memo(
                        HyperNode::new(lkey[n], left.depth - 1),
                        HyperNode::new(rkey[n], right.depth - 1),
                        op,
                        memo,
                    )
                    .index;
            }
            let combined = self.forest_mut().make_nonleaf_hn(left.depth, out);
            memo.insert(((left.index, right.index), left.depth), combined.index);
            return combined;
        }

        let lw = self.forest().leaf_entry(left.index).key.words();
        let rw = self.forest().leaf_entry(right.index).key.words();
        let mut words = [0u64; 4];
        for n in 0..4 {
            words[n] = op.apply(lw[n], rw[n]);
        }
        let result = self.forest_mut().make_leaf(Leaf::from_words(words));
        memo.insert(((left.index, right.index), 0), result);
        HyperNode::new(result, 0)
    }

    /// Combine two universes of any depths: the shallower is pyramided
    /// up to match, and the result is normalized back down.
    pub fn boolean_universe(&mut self, left: HyperNode, right: HyperNode, op: BoolOp) -> HyperNode {
        let mut left = left;
        let mut right = right;
        while left.depth < right.depth {
            left = self.pyramid_up(left);
        }
        while left.depth > right.depth {
            right = self.pyramid_up(right);
        }
        let combined = self.boolean_recurse(left, right, op);
        self.pyramid_down(combined)
    }

    /// Collapse a dual-layer node into its single-layer equivalent via
    /// OR. Identity for single-layer nodes.
    pub fn breach(&mut self, node: HyperNode) -> HyperNode {
        if node.index2 == 0 {
            node
        } else if node.index == 0 {
            HyperNode::new(node.index2, node.depth)
        } else {
            self.boolean_recurse(node.beszel(), node.ulqoma(), BoolOp::Or)
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
