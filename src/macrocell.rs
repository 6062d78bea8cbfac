//! Filepath: src/macrocell.rs
//!
//! The macrocell serialization format: line-oriented ASCII for canonical
//! quadtree patterns.
//!
//! A file starts with an `[M2]` header; `#` and `[` lines are comments.
//! Pattern lines are either an 8×8 subleaf drawn with `.`, `*` and `$`
//! (row terminator), or `k a b c d` where `a..d` are 1-based numbers of
//! previously emitted lines (0 = empty). `k = 4` assembles a 16×16 leaf
//! from four subleaves; `k ≥ 5` a non-leaf at depth `k − 4`; `k ≤ 3`
//! assemble bit-packed 2×2 / 4×4 / 8×8 tiles, which this writer never
//! emits but the reader accepts. The root is the last node line.

use std::io::{self, BufRead, Write};

use ahash::AHashMap;

use crate::kiv::Index;
use crate::node::HyperNode;
use crate::tracing_helpers::warn_log;
use crate::tree::LifeTree;

/// Failure to extract a pattern from macrocell input.
///
/// Malformed pattern lines are not errors: they are logged and skipped,
/// matching the format's per-line recovery convention.
#[derive(Debug)]
pub enum MacrocellError {
    /// The input contained no node line at all.
    MissingRoot,
    /// The underlying reader failed.
    Io(io::Error),
}

impl std::fmt::Display for MacrocellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "macrocell input contains no pattern"),

            Self::Io(e) => write!(f, "macrocell read failed: {e}"),
        }
    }
}

impl std::error::Error for MacrocellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingRoot => None,

            Self::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for MacrocellError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Translation from file cell states to in-memory bit patterns. The
/// identity map suffices for two-state files.
pub type LeafMap = AHashMap<u64, u64>;

impl LifeTree {
    // ------------------------------------------------------------------
    //  Writing
    // ------------------------------------------------------------------

    /// Serialize `node` as a two-state macrocell file. Dual-layer nodes
    /// are breached first.
    pub fn write_macrocell<W: Write>(&mut self, out: &mut W, node: HyperNode) -> io::Result<()> {
        writeln!(out, "[M2] (streamlife {})", env!("CARGO_PKG_VERSION"))?;
        let node = self.breach(node);
        let mut subleaf_lines = AHashMap::new();
        let mut node_lines = AHashMap::new();
        let mut line_number = 0;
        self.write_recurse(out, node, &mut subleaf_lines, &mut node_lines, &mut line_number)?;
        Ok(())
    }

    fn write_subleaf<W: Write>(
        out: &mut W,
        subleaf: u64,
        subleaf_lines: &mut AHashMap<u64, u64>,
        line_number: &mut u64,
    ) -> io::Result<u64> {
        if subleaf == 0 {
            return Ok(0);
        }
        if let Some(&line) = subleaf_lines.get(&subleaf) {
            return Ok(line);
        }

        let mut bits = subleaf;
        let mut row = String::with_capacity(72);
        for _ in 0..8 {
            for _ in 0..8 {
                row.push(if bits & 1 != 0 { '*' } else { '.' });
                bits >>= 1;
            }
            row.push('$');
        }
        writeln!(out, "{row}")?;

        *line_number += 1;
        subleaf_lines.insert(subleaf, *line_number);
        Ok(*line_number)
    }

    fn write_recurse<W: Write>(
        &mut self,
        out: &mut W,
        node: HyperNode,
        subleaf_lines: &mut AHashMap<u64, u64>,
        node_lines: &mut AHashMap<(Index, u32), u64>,
        line_number: &mut u64,
    ) -> io::Result<u64> {
        if node.index == 0 {
            return Ok(0);
        }
        if let Some(&line) = node_lines.get(&(node.index, node.depth)) {
            return Ok(line);
        }

        let mut parts = [0u64; 4];
        if node.depth == 0 {
            let words = self.forest().leaf_entry(node.index).key.words();
            for (part, word) in parts.iter_mut().zip(words) {
                *part = Self::write_subleaf(out, word, subleaf_lines, line_number)?;
            }
        } else {
            for (n, part) in parts.iter_mut().enumerate() {
                let child = self.forest().get_child(node, n as u32);
                *part = self.write_recurse(out, child, subleaf_lines, node_lines, line_number)?;
            }
        }

        writeln!(
            out,
            "{} {} {} {} {}",
            node.depth + 4,
            parts[0],
            parts[1],
            parts[2],
            parts[3]
        )?;
        *line_number += 1;
        node_lines.insert((node.index, node.depth), *line_number);
        Ok(*line_number)
    }

    // ------------------------------------------------------------------
    //  Reading
    // ------------------------------------------------------------------

    /// Parse a macrocell file into the forest, returning the root (the
    /// last node line). `lmap` rewrites file states to bit patterns;
    /// `None` is the identity map. Malformed lines are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// [`MacrocellError::MissingRoot`] if no node line was parsed, or a
    /// wrapped I/O failure from the reader.
    pub fn read_macrocell<R: BufRead>(
        &mut self,
        input: R,
        lmap: Option<&LeafMap>,
    ) -> Result<HyperNode, MacrocellError> {
        let state_bits = |state: u64| -> u64 {
            match lmap {
                Some(map) => map.get(&state).copied().unwrap_or(0),
                None => state,
            }
        };

        // Partial results, 1-based by emission order; slot 0 is empty.
        let mut partials: Vec<u64> = vec![0];
        let mut root: Option<(Index, u32)> = None;

        for line in input.lines() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }

            let first = line.as_bytes()[0];
            let partial = if matches!(first, b'.' | b'*' | b'$') {
                match Self::parse_subleaf(&line) {
                    Some(bits) => {
                        if state_bits(1) & 1 != 0 {
                            bits
                        } else {
                            0
                        }
                    }
                    None => {
                        warn_log!(line, "skipping malformed subleaf line");
                        continue;
                    }
                }
            } else if (b'1'..=b'9').contains(&first) {
                let Some((k, refs)) = Self::parse_node_line(&line) else {
                    warn_log!(line, "skipping malformed node line");
                    continue;
                };
                let fetch = |n: u64| -> Option<u64> { partials.get(n as usize).copied() };

                match k {
                    1 => {
                        // Four single cells, bit-packed into a 2×2 tile.
                        let [a, b, c, d] = refs.map(state_bits);
                        (a & 1) | ((b & 1) << 1) | ((c & 1) << 8) | ((d & 1) << 9)
                    }
                    2 | 3 => {
                        let Some([a, b, c, d]) = Self::fetch_all(&fetch, refs) else {
                            warn_log!(line, "skipping node line with bad reference");
                            continue;
                        };
                        if k == 2 {
                            a | (b << 2) | (c << 16) | (d << 18)
                        } else {
                            a | (b << 4) | (c << 32) | (d << 36)
                        }
                    }
                    4 => {
                        let Some(words) = Self::fetch_all(&fetch, refs) else {
                            warn_log!(line, "skipping node line with bad reference");
                            continue;
                        };
                        let index = self
                            .forest_mut()
                            .make_leaf(crate::leaf::Leaf::from_words(words));
                        root = Some((index, 0));
                        u64::from(index)
                    }
                    5..=36 => {
                        let Some(children) = Self::fetch_all(&fetch, refs) else {
                            warn_log!(line, "skipping node line with bad reference");
                            continue;
                        };
                        let depth = (k - 4) as u32;
                        let key = children.map(|c| c as Index);
                        let index = self.forest_mut().make_nonleaf(depth, key);
                        root = Some((index, depth));
                        u64::from(index)
                    }
                    _ => {
                        warn_log!(line, "skipping node line with unsupported size");
                        continue;
                    }
                }
            } else {
                warn_log!(line, "skipping unrecognised line");
                continue;
            };

            partials.push(partial);
        }

        match root {
            Some((index, depth)) => Ok(HyperNode::new(index, depth)),
            None => Err(MacrocellError::MissingRoot),
        }
    }

    /// Decode a dot/star subleaf row into an 8×8 bit pattern.
    fn parse_subleaf(line: &str) -> Option<u64> {
        let mut bits = 0u64;
        let mut x = 0u64;
        let mut y = 0u64;
        for c in line.chars() {
            match c {
                '$' => {
                    x = 0;
                    y += 1;
                }
                '*' => {
                    if x >= 8 || y >= 8 {
                        return None;
                    }
                    bits |= 1 << (x + 8 * y);
                    x += 1;
                }
                '.' => x += 1,
                _ => return None,
            }
        }
        Some(bits)
    }

    /// Split `k a b c d` into the size prefix and the four references.
    fn parse_node_line(line: &str) -> Option<(u64, [u64; 4])> {
        let mut fields = line.split_ascii_whitespace().map(str::parse::<u64>);
        let k = fields.next()?.ok()?;
        let mut refs = [0u64; 4];
        for slot in &mut refs {
            *slot = fields.next()?.ok()?;
        }
        if fields.next().is_some() {
            return None;
        }
        Some((k, refs))
    }

    fn fetch_all(fetch: &dyn Fn(u64) -> Option<u64>, refs: [u64; 4]) -> Option<[u64; 4]> {
        Some([fetch(refs[0])?, fetch(refs[1])?, fetch(refs[2])?, fetch(refs[3])?])
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_support::{blinker_node, glider_node};

    #[test]
    fn test_roundtrip_preserves_root() {
        let mut tree = LifeTree::new(64);
        let node = glider_node(&mut tree);

        let mut text = Vec::new();
        tree.write_macrocell(&mut text, node).unwrap();
        let reread = tree.read_macrocell(&text[..], None).unwrap();

        assert_eq!(reread, node);
    }

    #[test]
    fn test_header_and_comments_are_ignored() {
        let mut tree = LifeTree::new(64);
        let node = blinker_node(&mut tree);

        let mut text = Vec::new();
        tree.write_macrocell(&mut text, node).unwrap();
        let mut with_comments = b"# a comment\n\n".to_vec();
        with_comments.extend_from_slice(&text);
        with_comments.extend_from_slice(b"# trailing\n");

        assert_eq!(tree.read_macrocell(&with_comments[..], None).unwrap(), node);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut tree = LifeTree::new(64);
        let node = blinker_node(&mut tree);

        let mut text = Vec::new();
        tree.write_macrocell(&mut text, node).unwrap();
        // A malformed digit line before the payload must not derail the
        // numbering: it is skipped without occupying a line number.
        let mut patched = b"[M2] (something)\n9 1 2\n".to_vec();
        patched.extend_from_slice(&text);

        assert_eq!(tree.read_macrocell(&patched[..], None).unwrap(), node);
    }

    #[test]
    fn test_missing_root() {
        let mut tree = LifeTree::new(64);
        let text = b"[M2] (empty)\n# nothing else\n";

        assert!(matches!(
            tree.read_macrocell(&text[..], None),
            Err(MacrocellError::MissingRoot)
        ));
    }

    #[test]
    fn test_lmap_masks_states() {
        let mut tree = LifeTree::new(64);
        let node = blinker_node(&mut tree);

        let mut text = Vec::new();
        tree.write_macrocell(&mut text, node).unwrap();

        // State 1 mapped to no layers: the pattern reads back empty.
        let mut lmap = LeafMap::default();
        lmap.insert(0, 0);
        lmap.insert(1, 0);
        let blank = tree.read_macrocell(&text[..], Some(&lmap)).unwrap();
        assert_eq!(tree.population(blank, 1_000_000_007), 0);
    }
}
