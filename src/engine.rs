//! Filepath: src/engine.rs
//!
//! The engine capability: what both the plain and the streaming trees
//! expose to callers.
//!
//! [`Engine`] is the seam between the two iteration strategies. The
//! provided methods implement everything that is iteration-agnostic —
//! step decomposition, pyramid sizing around a recursion, the root
//! handle lifecycle — on top of the two required operations
//! `iterate_recurse` and `threshold_gc_bytes`.

use std::fmt as StdFmt;

use crate::node::HyperNode;
use crate::tree::LifeTree;

/// Mantissas the B3/S23 kernel can step in one call, as a bitmask.
const VALID_MANTISSAS: u64 = 0x1ff;

// ============================================================================
//  EngineError
// ============================================================================

/// Caller-visible engine failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An operation referenced a root handle that was never registered
    /// or has been deleted.
    InvalidHandle(u64),

    /// A step count cannot be decomposed as `m · 2^e` with a mantissa
    /// the rule supports.
    UnsupportedStep(u64),
}

impl StdFmt::Display for EngineError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidHandle(handle) => write!(f, "unknown root handle {handle}"),

            Self::UnsupportedStep(steps) => {
                write!(f, "rule b3s23 cannot be iterated {steps} generations")
            }
        }
    }
}

impl std::error::Error for EngineError {}

// ============================================================================
//  Engine
// ============================================================================

/// Common surface of the plain and streaming engines over a shared
/// forest layout.
pub trait Engine {
    /// The plain tree this engine is built on.
    fn tree(&self) -> &LifeTree;

    /// Mutable access to the plain tree.
    fn tree_mut(&mut self) -> &mut LifeTree;

    /// Advance `node` by `mantissa · 2^exponent` generations, returning
    /// the centred half-size node one depth down.
    fn iterate_recurse(&mut self, node: HyperNode, mantissa: u64, exponent: u64) -> HyperNode;

    /// Collect if memory exceeds `threshold` bytes (or a layer is over
    /// capacity). Returns whether a collection ran.
    fn threshold_gc_bytes(&mut self, threshold: u64) -> bool;

    /// Drop every reclaimable entry now.
    fn force_gc(&mut self);

    // ------------------------------------------------------------------
    //  Provided operations
    // ------------------------------------------------------------------

    /// Collect against the threshold configured at construction.
    fn threshold_gc(&mut self) -> bool {
        let threshold = self.tree().gc_threshold_bytes();
        self.threshold_gc_bytes(threshold)
    }

    /// One sizing-aware recursion pass: grow the pyramid until the
    /// result window covers the pattern and the time fits, advance, and
    /// normalize. The origin (the node centre) is preserved.
    fn advance_pow2(&mut self, node: HyperNode, mantissa: u64, exponent: u64) -> HyperNode {
        let node = self.tree_mut().pyramid_up(node);
        let node = self.tree_mut().pyramid_up(node);
        let node = self.tree_mut().pyramid_up_to(node, exponent as u32 + 2);
        let node = self.iterate_recurse(node, mantissa, exponent);
        self.tree_mut().pyramid_down(node)
    }

    /// Advance `node` by `steps` generations, decomposed into
    /// `mantissa · 2^exponent` passes with the largest usable mantissa.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnsupportedStep`] if no usable mantissa divides
    /// the step count (cannot happen for B3/S23, which supports all of
    /// 1..=8).
    fn advance(&mut self, node: HyperNode, steps: u64) -> Result<HyperNode, EngineError> {
        if steps == 0 {
            return Ok(self.tree_mut().pyramid_down(node));
        }

        let mut mantissa = 8u64;
        while mantissa != 1
            && (steps % mantissa != 0 || VALID_MANTISSAS & (1 << mantissa) == 0)
        {
            mantissa -= 1;
        }
        if VALID_MANTISSAS & (1 << mantissa) == 0 {
            return Err(EngineError::UnsupportedStep(steps));
        }

        let mut node = node;
        let mut multiplier = steps / mantissa;
        let mut exponent = 0;
        while multiplier != 0 {
            if multiplier & 1 != 0 {
                node = self.advance_pow2(node, mantissa, exponent);
            }
            multiplier >>= 1;
            exponent += 1;
        }
        Ok(node)
    }

    /// Register `node` as a root, protecting its reachable subgraph
    /// from collection. Returns a non-zero opaque id.
    fn new_handle(&mut self, node: HyperNode) -> u64 {
        self.tree_mut().forest_mut().new_handle(node)
    }

    /// Look up a registered root.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidHandle`] for an unknown id.
    fn handle_node(&self, handle: u64) -> Result<HyperNode, EngineError> {
        self.tree()
            .forest()
            .handle(handle)
            .ok_or(EngineError::InvalidHandle(handle))
    }

    /// Deregister a root handle, releasing its protection, and collect
    /// opportunistically if over threshold.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidHandle`] for an unknown id.
    fn delete_handle(&mut self, handle: u64) -> Result<(), EngineError> {
        if self.tree_mut().forest_mut().delete_handle(handle).is_none() {
            return Err(EngineError::InvalidHandle(handle));
        }
        self.threshold_gc();
        Ok(())
    }

    /// Advance the pattern behind a registered root in place.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidHandle`] for an unknown id, or the step
    /// decomposition failure from [`Engine::advance`].
    fn advance_handle(&mut self, handle: u64, steps: u64) -> Result<HyperNode, EngineError> {
        let node = self.handle_node(handle)?;
        let advanced = self.advance(node, steps)?;
        self.tree_mut().forest_mut().update_handle(handle, advanced);
        Ok(advanced)
    }
}

// ============================================================================
//  Implementations
// ============================================================================

impl Engine for LifeTree {
    fn tree(&self) -> &LifeTree {
        self
    }

    fn tree_mut(&mut self) -> &mut LifeTree {
        self
    }

    fn iterate_recurse(&mut self, node: HyperNode, mantissa: u64, exponent: u64) -> HyperNode {
        self.iterate_recurse1(node, mantissa, exponent)
    }

    fn threshold_gc_bytes(&mut self, threshold: u64) -> bool {
        if self.forest_mut().gc_partial() {
            return true;
        }
        if threshold != 0 && self.forest().total_bytes() >= threshold {
            self.forest_mut().gc_full(0);
            return true;
        }
        false
    }

    fn force_gc(&mut self) {
        self.forest_mut().gc_full(0);
    }
}

// The streaming implementation lives with its state in `crate::stream`.

// ============================================================================
//  Tests
// ============================================================================
