//! Fixed-capacity k-hash bloom filter (spec component C3).
//!
//! Used to test entity-id membership before a shard/chunk is actually read:
//! a negative answer lets the executor (`edgegraph-exec`) skip a storage
//! round-trip entirely.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default target element count, per spec.
pub const DEFAULT_CAPACITY: usize = 50_000;
/// Default target false-positive rate at `DEFAULT_CAPACITY` elements.
pub const DEFAULT_FPR: f64 = 0.01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BloomError {
    #[error("cannot union bloom filters with differing parameters (m: {m_a} vs {m_b}, k: {k_a} vs {k_b})")]
    ParameterMismatch { m_a: usize, m_b: usize, k_a: u32, k_b: u32 },
    #[error("serialized bloom filter is malformed: {0}")]
    Malformed(String),
}

/// A bit array of `m` bits tested/set by `k` independent hash functions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BloomFilter {
    m: usize,
    k: u32,
    bits: Vec<u64>,
}

impl BloomFilter {
    /// Builds a filter sized for `capacity` elements at `target_fpr` false
    /// positive rate, using the standard optimal-parameter formulas:
    /// `m = ceil(-n*ln(p) / ln(2)^2)`, `k = round((m/n)*ln(2))`.
    pub fn new(capacity: usize, target_fpr: f64) -> Self {
        let capacity = capacity.max(1);
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let m_bits = (-(capacity as f64) * target_fpr.ln() / ln2_sq).ceil().max(64.0) as usize;
        let k = (((m_bits as f64) / (capacity as f64)) * std::f64::consts::LN_2)
            .round()
            .max(1.0) as u32;
        Self::with_params(m_bits, k)
    }

    /// Constructs a filter with explicit bit width and hash count, rounding
    /// `m` up to a multiple of 64 so the backing store is whole `u64` words.
    pub fn with_params(m_bits: usize, k: u32) -> Self {
        let m_bits = m_bits.max(64);
        let words = m_bits.div_ceil(64);
        Self { m: words * 64, k: k.max(1), bits: vec![0u64; words] }
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    fn positions<K: Hash>(&self, key: &K) -> impl Iterator<Item = usize> + '_ {
        let h1 = hash_with_seed(key, 0x9e3779b97f4a7c15);
        let h2 = hash_with_seed(key, 0xc2b2ae3d27d4eb4f).wrapping_mul(2).wrapping_add(1);
        let m = self.m as u64;
        (0..self.k).map(move |i| {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (combined % m) as usize
        })
    }

    pub fn add<K: Hash>(&mut self, key: &K) {
        for pos in self.positions(key).collect::<Vec<_>>() {
            self.bits[pos / 64] |= 1u64 << (pos % 64);
        }
    }

    pub fn contains<K: Hash>(&self, key: &K) -> bool {
        self.positions(key).all(|pos| self.bits[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    /// Combines `other` into `self` in place. Requires equal `m` and `k`:
    /// the resulting filter answers `contains(x)` iff either input filter
    /// would have, for any `x`, as long as both were constructed with
    /// matching parameters (deterministic hash positions).
    pub fn union(&mut self, other: &BloomFilter) -> Result<(), BloomError> {
        if self.m != other.m || self.k != other.k {
            return Err(BloomError::ParameterMismatch {
                m_a: self.m,
                m_b: other.m,
                k_a: self.k,
                k_b: other.k,
            });
        }
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= b;
        }
        Ok(())
    }

    /// Returns a new filter that is the union of `self` and `other`,
    /// without mutating either input.
    pub fn unioned(&self, other: &BloomFilter) -> Result<BloomFilter, BloomError> {
        let mut out = self.clone();
        out.union(other)?;
        Ok(out)
    }

    pub fn serialize(&self) -> Vec<u8> {
        // 8 bytes m, 4 bytes k, then the bit words as little-endian u64s.
        let mut out = Vec::with_capacity(12 + self.bits.len() * 8);
        out.extend_from_slice(&(self.m as u64).to_le_bytes());
        out.extend_from_slice(&self.k.to_le_bytes());
        for word in &self.bits {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, BloomError> {
        if bytes.len() < 12 {
            return Err(BloomError::Malformed("buffer shorter than header".into()));
        }
        let m = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
        let k = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let rest = &bytes[12..];
        if rest.len() % 8 != 0 {
            return Err(BloomError::Malformed("bit section is not word-aligned".into()));
        }
        let words: Vec<u64> =
            rest.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect();
        if words.len() * 64 != m {
            return Err(BloomError::Malformed("bit word count does not match m".into()));
        }
        Ok(Self { m, k, bits: words })
    }
}

fn hash_with_seed<K: Hash>(key: &K, seed: u64) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn contains_after_add() {
        let mut f = BloomFilter::new(1000, 0.01);
        f.add(&"https://ex.com/e1");
        assert!(f.contains(&"https://ex.com/e1"));
    }

    #[test]
    fn union_requires_matching_params() {
        let a = BloomFilter::new(1000, 0.01);
        let b = BloomFilter::with_params(128, 3);
        let mut a = a;
        assert!(a.union(&b).is_err());
    }

    #[test]
    fn union_is_or_of_membership() {
        let mut a = BloomFilter::with_params(2048, 4);
        let mut b = BloomFilter::with_params(2048, 4);
        a.add(&"x");
        b.add(&"y");
        let u = a.unioned(&b).unwrap();
        assert!(u.contains(&"x"));
        assert!(u.contains(&"y"));
    }

    #[test]
    fn roundtrips_through_serialize() {
        let mut f = BloomFilter::new(500, 0.02);
        for i in 0..50 {
            f.add(&i);
        }
        let bytes = f.serialize();
        let restored = BloomFilter::deserialize(&bytes).unwrap();
        for i in 0..50 {
            assert!(restored.contains(&i));
        }
        assert_eq!(restored.m(), f.m());
        assert_eq!(restored.k(), f.k());
    }

    #[test]
    fn false_positive_rate_is_roughly_bounded() {
        let n = 5_000usize;
        let mut f = BloomFilter::new(n, 0.01);
        for i in 0..n {
            f.add(&format!("member-{i}"));
        }
        let mut false_positives = 0usize;
        let trials = 20_000usize;
        for i in 0..trials {
            if f.contains(&format!("absent-{i}")) {
                false_positives += 1;
            }
        }
        let observed_fpr = false_positives as f64 / trials as f64;
        // Generous slack: calibration target is 1%, allow up to 3x.
        assert!(observed_fpr < 0.03, "observed fpr {observed_fpr} too high");
    }

    proptest! {
        #[test]
        fn union_matches_logical_or(a_items in proptest::collection::vec(0u32..500, 0..50),
                                      b_items in proptest::collection::vec(0u32..500, 0..50),
                                      probe in 0u32..500) {
            let mut a = BloomFilter::with_params(4096, 5);
            let mut b = BloomFilter::with_params(4096, 5);
            for x in &a_items { a.add(x); }
            for x in &b_items { b.add(x); }
            let u = a.unioned(&b).unwrap();
            let expected = a.contains(&probe) || b.contains(&probe);
            prop_assert_eq!(u.contains(&probe), expected);
        }
    }
}
