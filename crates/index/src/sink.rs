//! Wires C6 into the write path: [`TripleIndexer`] implements
//! `edgegraph_store::IndexSink` so a [`edgegraph_store::Shard`] can feed it
//! every triple as it's written, and exposes the same `FtsManager`/
//! `HnswIndex`/`GeoIndex` collaborators for the read path to query
//! directly (spec §2: executor "uses C6 for indexed predicates").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use edgegraph_store::{BlobStore, IndexSink, StoreError, StoreResult};
use edgegraph_types::{Triple, TypedValue};

use crate::error::{FtsQueryError, IndexError};
use crate::fts::FtsManager;
use crate::geo::GeoIndex;
use crate::vector::{CosineDistance, HnswIndex, HnswParams};

impl From<IndexError> for StoreError {
    fn from(e: IndexError) -> Self {
        StoreError::Index(e.to_string())
    }
}

impl From<FtsQueryError> for StoreError {
    fn from(e: FtsQueryError) -> Self {
        StoreError::Index(e.to_string())
    }
}

/// One `TripleIndexer` per namespace, shared by every shard's write path
/// and by the RPC layer's read path. Vector indexes are created lazily,
/// one per predicate, the first time that predicate is written.
pub struct TripleIndexer {
    fts: FtsManager,
    geo: GeoIndex,
    vectors: RwLock<HashMap<String, Arc<HnswIndex>>>,
    blob: Arc<dyn BlobStore>,
    hnsw_params: HnswParams,
}

impl TripleIndexer {
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        Self::with_hnsw_params(blob, HnswParams::default())
    }

    pub fn with_hnsw_params(blob: Arc<dyn BlobStore>, hnsw_params: HnswParams) -> Self {
        Self { fts: FtsManager::new(), geo: GeoIndex::new(), vectors: RwLock::new(HashMap::new()), blob, hnsw_params }
    }

    pub fn fts(&self) -> &FtsManager {
        &self.fts
    }

    pub fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    /// The predicate's vector index, if any `VECTOR` triple has been
    /// written under it yet.
    pub fn vector_index(&self, predicate: &str) -> Option<Arc<HnswIndex>> {
        self.vectors.read().get(predicate).cloned()
    }

    fn vector_index_or_create(&self, predicate: &str) -> Arc<HnswIndex> {
        if let Some(existing) = self.vectors.read().get(predicate) {
            return existing.clone();
        }
        self.vectors
            .write()
            .entry(predicate.to_string())
            .or_insert_with(|| {
                Arc::new(HnswIndex::new(predicate.to_string(), self.hnsw_params, Arc::new(CosineDistance), self.blob.clone()))
            })
            .clone()
    }
}

#[async_trait]
impl IndexSink for TripleIndexer {
    async fn index_triple(&self, triple: &Triple) -> StoreResult<()> {
        match &triple.object {
            TypedValue::String(value) => {
                self.fts.initialize(triple.predicate.clone());
                self.fts.index_row(triple.predicate.as_str(), &triple.subject, value).map_err(StoreError::from)?;
            }
            TypedValue::Vector(vector) => {
                let index = self.vector_index_or_create(triple.predicate.as_str());
                let vector: Vec<f32> = vector.iter().map(|x| *x as f32).collect();
                index.insert(triple.subject.clone(), vector).await.map_err(StoreError::from)?;
            }
            TypedValue::GeoPoint(point) => {
                self.geo.index_point(triple.subject.clone(), point.clone());
            }
            _ => {}
        }
        Ok(())
    }

    async fn remove_triple(&self, triple: &Triple) -> StoreResult<()> {
        match &triple.object {
            TypedValue::String(value) => {
                self.fts.delete_row(triple.predicate.as_str(), &triple.subject, value).map_err(StoreError::from)?;
            }
            TypedValue::Vector(_) => {
                if let Some(index) = self.vector_index(triple.predicate.as_str()) {
                    index.delete(&triple.subject);
                }
            }
            TypedValue::GeoPoint(_) => {
                self.geo.delete(&triple.subject);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegraph_types::{EntityId, GeoPoint, Predicate, TxIdGenerator};
    use std::sync::Mutex as StdMutex;

    struct FakeBlob {
        store: StdMutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeBlob {
        fn new() -> Self {
            Self { store: StdMutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
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
        async fn list(&self, _prefix: &str, _cursor: Option<&str>, _limit: usize) -> Result<edgegraph_store::ListPage, edgegraph_store::BlobError> {
            Ok(edgegraph_store::ListPage { keys: Vec::new(), next_cursor: None })
        }
    }

    fn triple(subject: &str, predicate: &str, object: TypedValue, gen: &TxIdGenerator) -> Triple {
        Triple {
            subject: EntityId::parse(subject.to_string()).unwrap(),
            predicate: Predicate::parse(predicate.to_string()).unwrap(),
            object,
            timestamp: 1,
            tx_id: gen.next(1),
        }
    }

    #[tokio::test]
    async fn string_triple_becomes_searchable() {
        let indexer = TripleIndexer::new(Arc::new(FakeBlob::new()));
        let gen = TxIdGenerator::new();
        let t = triple("https://ex.com/e1", "bio", TypedValue::String("graph database engineer".into()), &gen);
        indexer.index_triple(&t).await.unwrap();
        let hits = indexer.fts().search("graph", Some("bio")).unwrap();
        assert_eq!(hits, vec![t.subject.clone()]);
    }

    #[tokio::test]
    async fn vector_triple_is_searchable_by_its_own_value() {
        let indexer = TripleIndexer::new(Arc::new(FakeBlob::new()));
        let gen = TxIdGenerator::new();
        let t = triple("https://ex.com/e1", "embedding", TypedValue::Vector(vec![1.0, 0.0, 0.0]), &gen);
        indexer.index_triple(&t).await.unwrap();
        let index = indexer.vector_index("embedding").unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].0, t.subject);
    }

    #[tokio::test]
    async fn geo_point_triple_is_found_by_bbox() {
        let indexer = TripleIndexer::new(Arc::new(FakeBlob::new()));
        let gen = TxIdGenerator::new();
        let t = triple("https://ex.com/e1", "location", TypedValue::GeoPoint(GeoPoint { lat: 40.0, lng: -73.0 }), &gen);
        indexer.index_triple(&t).await.unwrap();
        let hits = indexer.geo().query_bbox(39.0, -74.0, 41.0, -72.0);
        assert_eq!(hits, vec![t.subject]);
    }

    #[tokio::test]
    async fn remove_triple_clears_the_fts_entry() {
        let indexer = TripleIndexer::new(Arc::new(FakeBlob::new()));
        let gen = TxIdGenerator::new();
        let t = triple("https://ex.com/e1", "bio", TypedValue::String("graph database".into()), &gen);
        indexer.index_triple(&t).await.unwrap();
        indexer.remove_triple(&t).await.unwrap();
        assert!(indexer.fts().search("graph", Some("bio")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_indexed_value_kinds_are_ignored() {
        let indexer = TripleIndexer::new(Arc::new(FakeBlob::new()));
        let gen = TxIdGenerator::new();
        let t = triple("https://ex.com/e1", "age", TypedValue::Int32(30), &gen);
        indexer.index_triple(&t).await.unwrap();
        assert!(indexer.vector_index("age").is_none());
    }
}
