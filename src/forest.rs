//! Filepath: src/forest.rs
//!
//! The forest: one interning table per quadtree layer, plus root handles
//! and mark/sweep garbage collection.
//!
//! Layer 0 interns 16×16 [`Leaf`] bitmaps; layer `d ≥ 1` interns 4-tuples
//! of indices into layer `d − 1`. A non-leaf entry may only refer to
//! indices one layer down (or 0), so the structure is an acyclic DAG by
//! construction and ownership stays with the forest — nodes hold indices,
//! never pointers. Non-leaf layers are created on demand and never
//! destroyed before the forest is.

use std::collections::BTreeMap;

use crate::kiv::{Index, KivEntry, KivTable};
use crate::leaf::Leaf;
use crate::node::{HyperNode, NodeKey, NodeValue, INVALID_INDEX};
use crate::tracing_helpers::{debug_log, info_log};

/// Per-layer live-entry limit that triggers a partial collection:
/// 7/8 of the index space.
const MAX_LIVE: u64 = ((INVALID_INDEX as u64) >> 3) * 7;

/// A stack of interning tables holding every canonical subpattern, with
/// the root handles that protect them from collection.
pub struct Forest {
    leaves: KivTable<Leaf, NodeValue>,
    nonleaves: Vec<KivTable<NodeKey, NodeValue>>,
    handles: BTreeMap<u64, HyperNode>,
    handle_counter: u64,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    /// Create an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self {
            leaves: KivTable::new(),
            nonleaves: Vec::new(),
            handles: BTreeMap::new(),
            handle_counter: 0,
        }
    }

    // ------------------------------------------------------------------
    //  Construction and access
    // ------------------------------------------------------------------

    /// Intern a leaf bitmap, returning its index (0 for the empty leaf).
    pub fn make_leaf(&mut self, leaf: Leaf) -> Index {
        self.leaves.intern(&leaf)
    }

    /// Intern a non-leaf node at `depth ≥ 1` from four child indices,
    /// creating missing layers on the way up.
    pub fn make_nonleaf(&mut self, depth: u32, children: NodeKey) -> Index {
        debug_assert!(depth >= 1);
        while self.nonleaves.len() < depth as usize {
            self.nonleaves.push(KivTable::new());
        }
        self.nonleaves[depth as usize - 1].intern(&children)
    }

    /// [`Forest::make_nonleaf`], wrapped as a handle.
    pub fn make_nonleaf_hn(&mut self, depth: u32, children: NodeKey) -> HyperNode {
        HyperNode::new(self.make_nonleaf(depth, children), depth)
    }

    /// Resolve a non-leaf index at `depth ≥ 1` to its entry.
    #[inline]
    #[must_use]
    pub fn nonleaf(&self, depth: u32, index: Index) -> &KivEntry<NodeKey, NodeValue> {
        self.nonleaves[depth as usize - 1].entry(index)
    }

    /// Mutable variant of [`Forest::nonleaf`].
    #[inline]
    pub fn nonleaf_mut(&mut self, depth: u32, index: Index) -> &mut KivEntry<NodeKey, NodeValue> {
        self.nonleaves[depth as usize - 1].entry_mut(index)
    }

    /// Resolve a leaf index to its entry.
    #[inline]
    #[must_use]
    pub fn leaf_entry(&self, index: Index) -> &KivEntry<Leaf, NodeValue> {
        self.leaves.entry(index)
    }

    /// Mutable variant of [`Forest::leaf_entry`].
    #[inline]
    pub fn leaf_entry_mut(&mut self, index: Index) -> &mut KivEntry<Leaf, NodeValue> {
        self.leaves.entry_mut(index)
    }

    /// The `n`-th quadrant of `parent` (Z-order), one depth down.
    ///
    /// Children of the empty node are empty. Leaves have no children and
    /// yield the invalid sentinel, as does any invalid input.
    #[must_use]
    pub fn get_child(&self, parent: HyperNode, n: u32) -> HyperNode {
        if parent.depth == 0 || parent.is_invalid() || n >= 4 {
            return HyperNode::invalid();
        }
        let index = if parent.index == 0 {
            0
        } else {
            self.nonleaf(parent.depth, parent.index).key[n as usize]
        };
        HyperNode::new(index, parent.depth - 1)
    }

    /// Number of non-leaf layers currently allocated.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> u32 {
        self.nonleaves.len() as u32
    }

    /// Live entries in the layer at `depth`.
    #[must_use]
    pub fn layer_len(&self, depth: u32) -> usize {
        if depth == 0 {
            self.leaves.len()
        } else {
            self.nonleaves[depth as usize - 1].len()
        }
    }

    /// Approximate heap footprint of every layer, in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        let mut n = self.leaves.total_bytes();
        for table in &self.nonleaves {
            n += table.total_bytes();
        }
        n
    }

    // ------------------------------------------------------------------
    //  Root handles
    // ------------------------------------------------------------------

    /// Register `node` as a root, returning a non-zero opaque id. Roots
    /// and everything reachable from them survive collection.
    pub fn new_handle(&mut self, node: HyperNode) -> u64 {
        self.handle_counter += 1;
        self.handles.insert(self.handle_counter, node);
        self.handle_counter
    }

    /// Deregister a root handle. Returns the node it protected, or
    /// `None` for an unknown id.
    pub fn delete_handle(&mut self, handle: u64) -> Option<HyperNode> {
        self.handles.remove(&handle)
    }

    /// Look up a registered root.
    #[must_use]
    pub fn handle(&self, handle: u64) -> Option<HyperNode> {
        self.handles.get(&handle).copied()
    }

    /// Re-point a registered root at a new node. Returns `false` for an
    /// unknown id.
    pub fn update_handle(&mut self, handle: u64, node: HyperNode) -> bool {
        match self.handles.get_mut(&handle) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    //  Garbage collection
    // ------------------------------------------------------------------

    /// Phase 1 / phase 3 of collection over every layer at or above
    /// `min_depth`: clear all flags (`destructive == false`) or sweep
    /// unmarked entries (`destructive == true`).
    fn gc_traverse(&mut self, min_depth: u32, destructive: bool) {
        for (i, table) in self.nonleaves.iter_mut().enumerate() {
            if (i + 1) as u32 >= min_depth {
                if destructive {
                    table.gc_sweep();
                } else {
                    table.gc_begin();
                }
            }
        }
        if min_depth == 0 {
            if destructive {
                self.leaves.gc_sweep();
            } else {
                self.leaves.gc_begin();
            }
        }
    }

    /// Recursively mark `node` and everything below it down to
    /// `min_depth`, returning the assigned mark number (0 for nodes that
    /// need no mark). Dual-layer nodes mark both sublayers.
    pub fn gc_mark(&mut self, min_depth: u32, node: HyperNode) -> u64 {
        if node.depth < min_depth {
            return 0;
        }
        if node.index2 != 0 {
            self.gc_mark(min_depth, node.ulqoma());
            self.gc_mark(min_depth, node.beszel());
            return 0;
        }
        if node.index == 0 || node.index == INVALID_INDEX {
            return 0;
        }
        if node.depth == 0 {
            if self.leaves.entry(node.index).flags.is_clear() {
                return self.leaves.assign_mark(node.index);
            }
            return self.leaves.entry(node.index).flags.mark();
        }
        if !self.nonleaf(node.depth, node.index).flags.is_clear() {
            return self.nonleaf(node.depth, node.index).flags.mark();
        }
        let children = self.nonleaf(node.depth, node.index).key;
        for child in children {
            self.gc_mark(min_depth, HyperNode::new(child, node.depth - 1));
        }
        self.nonleaves[node.depth as usize - 1].assign_mark(node.index)
    }

    /// Full three-phase mark/sweep over every layer at or above
    /// `min_depth`. Layers below are immortal for this pass; their
    /// entries keep their caches.
    pub fn gc_full(&mut self, min_depth: u32) {
        let _orig_bytes = self.total_bytes();
        info_log!(min_depth, "starting full garbage collection");

        self.gc_traverse(min_depth, false);

        let roots: Vec<HyperNode> = self.handles.values().copied().collect();
        for root in roots {
            self.gc_mark(min_depth, root);
        }

        self.gc_traverse(min_depth, true);

        let _new_bytes = self.total_bytes();
        info_log!(
            from_bytes = _orig_bytes,
            to_bytes = _new_bytes,
            "garbage collection finished"
        );
    }

    /// Capacity-driven collection: if any layer holds more than 7/8 of
    /// the index space, run a full collection rooted at the lowest
    /// overfull layer. Returns whether a collection ran.
    pub fn gc_partial(&mut self) -> bool {
        if self.leaves.len() as u64 > MAX_LIVE {
            debug_log!("leaf layer overfull");
            self.gc_full(0);
            return true;
        }
        for depth in 1..=self.nonleaves.len() as u32 {
            if self.nonleaves[depth as usize - 1].len() as u64 > MAX_LIVE {
                debug_log!(depth, "non-leaf layer overfull");
                self.gc_full(depth);
                return true;
            }
        }
        false
    }
}

// ============================================================================
//  Tests
// ============================================================================
