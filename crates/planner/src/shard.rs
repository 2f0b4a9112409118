//! Deterministic shard assignment (spec §4.8): the same `(namespace,
//! subject)` must route to the same shard id in every process, so two
//! planning passes over the same query produce the same
//! [`crate::QueryPlan::shards`].

use std::hash::{Hash, Hasher};

/// Total shard count this workspace plans against. Chosen as a fixed,
/// documented constant rather than discovered at plan time — the spec
/// only requires determinism, not elasticity.
pub const NUM_SHARDS: u32 = 64;

/// Hashes `(namespace, subject)` to a shard id in `0..NUM_SHARDS`.
/// `std::collections::hash_map::DefaultHasher` uses fixed (unseeded) keys,
/// so this is stable across runs and processes, matching the bloom
/// filter's own hashing approach (`edgegraph_bloom::BloomFilter`).
pub fn shard_for(namespace: &str, subject: &str) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    namespace.hash(&mut hasher);
    subject.hash(&mut hasher);
    (hasher.finish() % NUM_SHARDS as u64) as u32
}
