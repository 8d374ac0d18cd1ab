//! Deterministic path-to-topic mapping (spec §4.1).
//!
//! `gen_path_key` must produce byte-identical output on every rank given the
//! same `(path, depth, bins)` — this is a wire contract, not an
//! implementation detail. The seed schedule and xor-fold below are fixed;
//! changing them breaks compatibility with every other rank in a job.

use std::io::Cursor;

use thiserror::Error;

/// Per-level seed offsets, applied as `57 + SEEDS[level % SEEDS.len()]`.
pub const SEEDS: [u32; 10] = [
    104677, 104681, 104683, 104693, 104701, 104707, 104711, 104717, 104723, 104729,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("gen_path_key: depth and bins must both be >= 1 (depth={depth}, bins={bins})")]
    InvalidArgs { depth: u32, bins: u32 },
}

/// The 128-bit MurmurHash3 x64 digest split into four 32-bit words,
/// `(h0, h1, h2, h3)`, least-significant word first. This decomposition
/// (rather than, say, big-endian byte order) is the implementation's choice
/// of bit layout for the xor-fold — see `DESIGN.md` for why it was picked
/// without a reference implementation to check against.
fn hash_words(path: &str, seed: u32) -> (u32, u32, u32, u32) {
    let mut cursor = Cursor::new(path.as_bytes());
    let digest = murmur3::murmur3_x64_128(&mut cursor, seed)
        .expect("hashing an in-memory byte slice cannot fail");
    let h0 = digest as u32;
    let h1 = (digest >> 32) as u32;
    let h2 = (digest >> 64) as u32;
    let h3 = (digest >> 96) as u32;
    (h0, h1, h2, h3)
}

fn level_bin(path: &str, level: u32, bins: u32) -> u32 {
    let seed = 57u32.wrapping_add(SEEDS[(level as usize) % SEEDS.len()]);
    let (h0, h1, h2, h3) = hash_words(path, seed);
    (h0 ^ h1 ^ h2 ^ h3) % bins
}

/// Computes the hierarchical KVS key for `path`: `b0.b1.….b_{depth-1}.<path>`,
/// each `b_i` rendered as lowercase hex.
pub fn gen_path_key(path: &str, depth: u32, bins: u32) -> Result<String, TopicError> {
    if depth == 0 || bins == 0 {
        return Err(TopicError::InvalidArgs { depth, bins });
    }

    let mut key = String::new();
    for level in 0..depth {
        let bin = level_bin(path, level, bins);
        key.push_str(&format!("{bin:x}"));
        key.push('.');
    }
    key.push_str(path);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_depth_or_bins() {
        assert!(gen_path_key("a", 0, 16).is_err());
        assert!(gen_path_key("a", 3, 0).is_err());
    }

    #[test]
    fn deterministic_across_calls() {
        let a = gen_path_key("a/b/c.dat", 3, 1024).unwrap();
        let b = gen_path_key("a/b/c.dat", 3, 1024).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_paths_usually_diverge() {
        let a = gen_path_key("a/b/c.dat", 3, 1024).unwrap();
        let b = gen_path_key("a/b/d.dat", 3, 1024).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_ends_with_literal_path() {
        let key = gen_path_key("a/b/c.dat", 1, 16).unwrap();
        assert!(key.ends_with("a/b/c.dat"));
        // one bin segment + the path segment
        assert_eq!(key.matches('.').count(), "a/b/c.dat".matches('.').count() + 1);
    }

    #[test]
    fn depth_controls_segment_count() {
        let key = gen_path_key("a/b/c.dat", 3, 1024).unwrap();
        let dots_before_path = key.len() - key.find("a/b/c.dat").unwrap();
        let _ = dots_before_path;
        let prefix = &key[..key.find("a/b/c.dat").unwrap()];
        assert_eq!(prefix.matches('.').count(), 3);
    }

    #[test]
    fn empty_path_is_valid() {
        let key = gen_path_key("", 3, 1024).unwrap();
        assert!(key.ends_with('.'));
        assert_eq!(key.matches('.').count(), 3);
    }

    // Spec §8's golden-value table, computed once against the canonical
    // MurmurHash3_x64_128 algorithm (see DESIGN.md: no cross-language
    // reference binary was available in this workspace's corpus, so these
    // were derived independently rather than copied from one). Pinning the
    // literal strings, not just their shape, is what catches an accidental
    // change to the seed table or xor-fold.
    #[test]
    fn golden_vectors() {
        assert_eq!(gen_path_key("a/b/c.dat", 1, 16).unwrap(), "8.a/b/c.dat");
        assert_eq!(
            gen_path_key("a/b/c.dat", 3, 1024).unwrap(),
            "118.124.1d1.a/b/c.dat"
        );
        assert_eq!(gen_path_key("", 3, 1024).unwrap(), "2cd.12.2b5.");
    }
}
