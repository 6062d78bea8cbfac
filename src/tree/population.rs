//! Filepath: src/tree/population.rs
//!
//! Population counts, single-cell probes, and content hashing.

use crate::node::HyperNode;
use crate::tree::LifeTree;

/// Fibonacci-style hash combiner: `x ^ (y + φ + (x << 6) + (x >> 2))`.
#[inline]
const fn combine(x: u64, y: u64) -> u64 {
    x ^ (y.wrapping_add(0x9e37_79b9).wrapping_add(x << 6).wrapping_add(x >> 2))
}

impl LifeTree {
    /// Population of `node` modulo the prime `modprime`.
    ///
    /// Counts are memoized in each entry's `aux` field. At depth ≤ 11 a
    /// node holds fewer cells than any usable modulus, so the cached
    /// count is exact and prime-independent; above that the cache also
    /// records the modulus it was reduced by (see
    /// [`crate::kiv::GcFlags`]).
    pub fn population(&mut self, node: HyperNode, modprime: u32) -> u32 {
        if node.index2 != 0 {
            let merged = self.breach(node);
            return self.population(merged, modprime);
        }
        if node.index == 0 {
            return 0;
        }

        if node.depth == 0 {
            let entry = self.forest().leaf_entry(node.index);
            if entry.flags.aux_valid_small() {
                return entry.value.aux;
            }
            let pop = entry.key.population();
            let entry = self.forest_mut().leaf_entry_mut(node.index);
            entry.value.aux = pop;
            entry.flags.set_aux_valid_small();
            return pop;
        }

        let entry = self.forest().nonleaf(node.depth, node.index);
        let cached = if node.depth <= 11 {
            entry.flags.aux_valid_small()
        } else {
            entry.flags.aux_valid_for_prime(modprime)
        };
        if cached {
            return entry.value.aux;
        }

        let children = entry.key;
        let mut pop: u32 = 0;
        for child in children {
            let part = self.population(HyperNode::new(child, node.depth - 1), modprime);
            pop = ((u64::from(pop) + u64::from(part)) % u64::from(modprime)) as u32;
        }

        let entry = self.forest_mut().nonleaf_mut(node.depth, node.index);
        entry.value.aux = pop;
        entry.flags.set_aux_prime(modprime);
        pop
    }

    /// Probe the cell at `(x, y)` of `node`, measured from its
    /// north-west corner. Dual-layer nodes probe both sublayers.
    #[must_use]
    pub fn get_cell(&self, node: HyperNode, x: u64, y: u64) -> bool {
        if node.index2 != 0 && self.get_cell(node.ulqoma(), x, y) {
            return true;
        }
        if node.index == 0 || node.is_invalid() {
            return false;
        }
        if node.depth == 0 {
            return self.forest().leaf_entry(node.index).key.get(x & 15, y & 15);
        }
        let tx = (x >> (node.depth + 3)) & 1;
        let ty = (y >> (node.depth + 3)) & 1;
        self.get_cell(self.forest().get_child(node.beszel(), (tx + 2 * ty) as u32), x, y)
    }

    /// Content hash of a root node, independent of how the DAG was
    /// built. Dual-layer roots are breached first.
    ///
    /// The per-call memo table is keyed by `(index, depth)` and dropped
    /// when the root call returns, so hashes never outlive a GC epoch.
    pub fn hash(&mut self, node: HyperNode) -> u64 {
        let node = self.breach(node);
        let result = self.hash_recurse(node);
        self.hash_cache_mut().clear();
        result
    }

    fn hash_recurse(&mut self, node: HyperNode) -> u64 {
        if let Some(&cached) = self.hash_cache_mut().get(&(node.index, node.depth)) {
            return cached;
        }

        if node.index == 0 && node.depth > 0 {
            // Empty nodes have no entry to walk; fold the empty child
            // hash four times.
            let part = self.hash_recurse(HyperNode::new(0, node.depth - 1));
            let mut result = 0;
            for _ in 0..4 {
                result = combine(result, part);
            }
            self.hash_cache_mut().insert((node.index, node.depth), result);
            return result;
        }

        let mut result = 0;
        if node.depth == 0 {
            for word in self.forest().leaf_entry(node.index).key.words() {
                result = combine(result, word);
            }
        } else {
            let children = self.forest().nonleaf(node.depth, node.index).key;
            for child in children {
                let part = self.hash_recurse(HyperNode::new(child, node.depth - 1));
                result = combine(result, part);
            }
        }
        self.hash_cache_mut().insert((node.index, node.depth), result);
        result
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::node::HyperNode;
    use crate::test_support::{blinker_node, block_node};
    use crate::tree::LifeTree;

    const PRIMES: [u32; 3] = [1_000_000_007, 1_073_741_827, 998_244_353];

    #[test]
    fn test_population_matches_cells() {
        let mut tree = LifeTree::new(64);
        let blinker = blinker_node(&mut tree);
        let block = block_node(&mut tree);

        for p in PRIMES {
            assert_eq!(tree.population(blinker, p), 3);
            assert_eq!(tree.population(block, p), 4);
            assert_eq!(tree.population(HyperNode::new(0, 5), p), 0);
        }
    }

    #[test]
    fn test_population_of_dual_node() {
        let mut tree = LifeTree::new(64);
        let blinker = blinker_node(&mut tree);
        let block = block_node(&mut tree);
        let dual = HyperNode::dual(blinker.index, block.index, blinker.depth);

        assert_eq!(tree.population(dual, PRIMES[0]), 7);
    }

    #[test]
    fn test_population_cache_survives_requery() {
        let mut tree = LifeTree::new(64);
        let node = blinker_node(&mut tree);
        let node = tree.pyramid_up(node);

        assert_eq!(tree.population(node, PRIMES[0]), 3);
        // Second query hits the small-depth cache, any modulus.
        assert_eq!(tree.population(node, PRIMES[1]), 3);
    }

    #[test]
    fn test_hash_is_content_addressed() {
        let mut tree = LifeTree::new(64);
        let a = blinker_node(&mut tree);
        let b = blinker_node(&mut tree);
        let c = block_node(&mut tree);

        let ha = tree.hash(a);
        assert_eq!(ha, tree.hash(b));
        assert_ne!(ha, tree.hash(c));
    }

    #[test]
    fn test_hash_distinguishes_depth_of_empty() {
        let mut tree = LifeTree::new(64);
        let h1 = tree.hash(HyperNode::new(0, 1));
        let h2 = tree.hash(HyperNode::new(0, 2));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_get_cell() {
        let mut tree = LifeTree::new(64);
        let node = blinker_node(&mut tree);

        // Horizontal blinker centred on (16, 16) of the 32×32 node.
        assert!(tree.get_cell(node, 15, 16));
        assert!(tree.get_cell(node, 16, 16));
        assert!(tree.get_cell(node, 17, 16));
        assert!(!tree.get_cell(node, 16, 15));
        assert!(!tree.get_cell(node, 0, 0));
    }
}
