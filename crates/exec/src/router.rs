//! Shard registry plus the per-shard bloom filter that lets the executor
//! skip a storage round-trip on a miss (spec §4.9 point 1, S6).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use edgegraph_bloom::BloomFilter;
use edgegraph_store::Shard;
use edgegraph_types::EntityId;

use crate::error::{ExecError, ExecResult};

/// One shard plus the membership filter the executor consults before
/// touching it.
pub struct ShardHandle {
    shard: Arc<Shard>,
    bloom: RwLock<BloomFilter>,
}

impl ShardHandle {
    pub fn new(shard: Arc<Shard>) -> Self {
        Self::with_bloom_params(shard, edgegraph_bloom::DEFAULT_CAPACITY, edgegraph_bloom::DEFAULT_FPR)
    }

    pub fn with_bloom_params(shard: Arc<Shard>, bloom_capacity: usize, bloom_fpr: f64) -> Self {
        Self { shard, bloom: RwLock::new(BloomFilter::new(bloom_capacity, bloom_fpr)) }
    }

    pub fn shard(&self) -> &Arc<Shard> {
        &self.shard
    }

    /// Registers `id` as present. Called whenever the shard accepts a
    /// write for that subject, so the filter never produces a false
    /// negative.
    pub fn register(&self, id: &EntityId) {
        self.bloom.write().add(&id.as_str());
    }

    /// `false` means "definitely absent" — the caller may skip storage
    /// entirely; `true` may still be a false positive, in which case the
    /// caller falls through to the row table and gets an authoritative
    /// answer.
    pub fn may_contain(&self, id: &EntityId) -> bool {
        self.bloom.read().contains(&id.as_str())
    }
}

/// Routes subjects to shards by [`edgegraph_planner::shard_for`] and holds
/// the registered [`ShardHandle`]s the executor dispatches against.
pub struct Router {
    namespace: String,
    shards: HashMap<u32, ShardHandle>,
}

impl Router {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), shards: HashMap::new() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn insert_shard(&mut self, shard_id: u32, shard: Arc<Shard>) {
        self.shards.insert(shard_id, ShardHandle::new(shard));
    }

    pub fn insert_shard_with_bloom_params(&mut self, shard_id: u32, shard: Arc<Shard>, bloom_capacity: usize, bloom_fpr: f64) {
        self.shards.insert(shard_id, ShardHandle::with_bloom_params(shard, bloom_capacity, bloom_fpr));
    }

    pub fn shard_id_for(&self, id: &EntityId) -> u32 {
        edgegraph_planner::shard_for(&self.namespace, id.as_str())
    }

    pub fn handle(&self, shard_id: u32) -> ExecResult<&ShardHandle> {
        self.shards.get(&shard_id).ok_or(ExecError::ShardNotFound(shard_id))
    }

    pub fn handle_for(&self, id: &EntityId) -> ExecResult<&ShardHandle> {
        self.handle(self.shard_id_for(id))
    }

    pub fn all_handles(&self) -> impl Iterator<Item = &ShardHandle> {
        self.shards.values()
    }

    /// Marks `id` present in its assigned shard's bloom filter. Callers
    /// that write through `edgegraph_store::Shard` directly should call
    /// this afterward so routing stays consistent with storage.
    pub fn register(&self, id: &EntityId) -> ExecResult<()> {
        self.handle_for(id)?.register(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegraph_store::{BlobStore, ChunkMeta, ListPage, ManifestSink, WriterConfig};
    use std::sync::Mutex as StdMutex;

    struct FakeBlob {
        store: StdMutex<HashMap<String, Vec<u8>>>,
    }
    #[async_trait::async_trait]
    impl BlobStore for FakeBlob {
        async fn get(&self, key: &str) -> Result<Vec<u8>, edgegraph_store::BlobError> {
            self.store.lock().unwrap().get(key).cloned().ok_or_else(|| edgegraph_store::BlobError::NotFound(key.to_string()))
        }
        async fn put(&self, key: &str, body: Vec<u8>, _content_type: Option<&str>) -> Result<(), edgegraph_store::BlobError> {
            self.store.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<(), edgegraph_store::BlobError> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
        async fn list(&self, _prefix: &str, _cursor: Option<&str>, _limit: usize) -> Result<ListPage, edgegraph_store::BlobError> {
            Ok(ListPage { keys: Vec::new(), next_cursor: None })
        }
    }
    struct NullSink;
    #[async_trait::async_trait]
    impl ManifestSink for NullSink {
        async fn register_chunk(&self, _namespace: &str, _meta: ChunkMeta) -> edgegraph_store::StoreResult<()> {
            Ok(())
        }
    }

    fn router_with_one_shard(namespace: &str, shard_id: u32) -> Router {
        let mut router = Router::new(namespace);
        let shard = Arc::new(Shard::new(WriterConfig::new(namespace), Arc::new(FakeBlob { store: StdMutex::new(HashMap::new()) }), Arc::new(NullSink)));
        router.insert_shard(shard_id, shard);
        router
    }

    #[test]
    fn bloom_miss_skips_storage() {
        let probe = Router::new("https://ex.com");
        let id = EntityId::parse("https://ex.com/e1").unwrap();
        let shard_id = probe.shard_id_for(&id);
        // insert only the shard this id would route to, but never register it
        let mut router = Router::new("https://ex.com");
        let shard = Arc::new(Shard::new(WriterConfig::new("https://ex.com"), Arc::new(FakeBlob { store: StdMutex::new(HashMap::new()) }), Arc::new(NullSink)));
        router.insert_shard(shard_id, shard);
        assert!(!router.handle(shard_id).unwrap().may_contain(&id));
    }

    #[test]
    fn registered_id_is_found_by_bloom() {
        let router = router_with_one_shard("https://ex.com", 0);
        let id = EntityId::parse("https://ex.com/e1").unwrap();
        router.register(&id).unwrap();
        assert!(router.handle_for(&id).unwrap().may_contain(&id));
    }
}
