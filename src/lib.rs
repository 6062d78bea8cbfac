//! # streamlife
//!
//! A HashLife engine for Conway's Life (rule B3/S23) on an effectively
//! unbounded grid, with a streaming two-layer optimization.
//!
//! ## Design
//!
//! Every `2^n × 2^n` subpattern is interned once in a per-layer table
//! and addressed by a dense index; identical subtrees share one entry,
//! so a universe is a canonical DAG owned by its [`Forest`]. Gosper's
//! algorithm advances a node by `m · 2^e` generations by recursing over
//! nine overlapping children, memoizing the centred result on the node's
//! own entry.
//!
//! The streaming engine ([`StreamTree`]) additionally splits a
//! configuration into two sublayers and tracks, per node, a packed
//! descriptor of the *lanes* (row, column, or diagonal residue classes)
//! its translating content can occupy. While the two sublayers travel
//! opposing directions on disjoint lanes they provably cannot interact,
//! and each is advanced independently — the pair recombines bit-for-bit
//! with what the plain engine would have produced.
//!
//! ## Memory
//!
//! The forest owns all memory. Root handles protect reachable
//! subgraphs; everything else is reclaimed by mark/sweep collection,
//! triggered explicitly, by per-layer capacity, or by the byte threshold
//! configured at engine construction. Collections never renumber
//! surviving entries.
//!
//! ## Example
//!
//! ```rust
//! use streamlife::{Engine, Leaf, LifeTree};
//!
//! let mut tree = LifeTree::new(256);
//!
//! // A blinker in the south-east quadrant of a 32×32 node.
//! let mut leaf = Leaf::default();
//! leaf.set(0, 1);
//! leaf.set(1, 1);
//! leaf.set(2, 1);
//! let index = tree.forest_mut().make_leaf(leaf);
//! let node = tree.forest_mut().make_nonleaf_hn(1, [0, 0, 0, index]);
//!
//! let advanced = tree.advance(node, 2).unwrap();
//! assert_eq!(tree.population(advanced, 1_000_000_007), 3);
//! ```

pub mod engine;
pub mod forest;
pub mod kernel;
pub mod kiv;
pub mod lanes;
pub mod leaf;
pub mod macrocell;
pub mod node;
pub mod stream;
pub mod tree;

mod tracing_helpers;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{Engine, EngineError};
pub use forest::Forest;
pub use kiv::{GcFlags, Index, InternKey, KivEntry, KivTable};
pub use lanes::Lanes;
pub use leaf::Leaf;
pub use macrocell::{LeafMap, MacrocellError};
pub use node::{HyperNode, NodeKey, NodeValue, INVALID_INDEX};
pub use stream::StreamTree;
pub use tree::{BoolOp, LifeTree};
