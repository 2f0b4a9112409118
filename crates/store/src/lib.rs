//! Per-shard hybrid triple store (spec component C4): a row table for
//! indexable point lookups, a batched writer that spills accumulated
//! triples into GraphCol chunks, and a compactor that migrates row-table
//! entries into chunks once they age out. `Shard` ties the three together
//! behind the single-writer-many-reader scheduling model described in
//! spec §5: reads never block each other, writes to a shard serialize
//! through the row table's internal lock.

mod backoff;
mod blob;
mod compactor;
mod error;
mod index_sink;
mod migrations;
mod row_table;
mod writer;

pub use backoff::{Backoff, BackoffConfig};
pub use blob::{chunk_key, manifest_key, reverse_namespace, vector_key, BlobStore, ListPage};
pub use compactor::{CompactionResult, Compactor};
pub use error::{BlobError, StoreError, StoreResult};
pub use index_sink::IndexSink;
pub use migrations::{migrate_to_version, SCHEMA_VERSION};
pub use row_table::RowTable;
pub use writer::{
    BatchedWriter, ChunkMeta, FinalizeMetadata, ManifestSink, WriterConfig, WriterState,
    DEFAULT_MAX_BUFFERED_TRIPLES, DEFAULT_MAX_PENDING_BATCHES,
};

use std::sync::Arc;

use edgegraph_types::{EntityId, Predicate, TransactionId, Triple, TypedValue};
use tracing::warn;

/// A shard: the unit of ownership for a subset of triples, addressed by a
/// hash of subject or namespace (spec glossary). Bundles the row table
/// (synchronous point access) with the batched writer (async chunk
/// spill) and a compactor for background maintenance.
pub struct Shard {
    namespace: String,
    rows: RowTable,
    writer: BatchedWriter,
    compactor: Compactor,
    index: Option<Arc<dyn IndexSink>>,
}

impl Shard {
    pub fn new(config: WriterConfig, blob: Arc<dyn BlobStore>, sink: Arc<dyn ManifestSink>) -> Self {
        let namespace = config.namespace.clone();
        Self {
            compactor: Compactor::new(namespace.clone()),
            namespace,
            rows: RowTable::new(),
            writer: BatchedWriter::new(config, blob, sink),
            index: None,
        }
    }

    /// Attaches the collaborator that keeps C6 (FTS/vector/geo) current as
    /// this shard is written to. Builder-style so callers set it once,
    /// before the shard is shared behind an `Arc`.
    pub fn with_index_sink(mut self, index: Arc<dyn IndexSink>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn rows(&self) -> &RowTable {
        &self.rows
    }

    pub fn writer(&self) -> &BatchedWriter {
        &self.writer
    }

    pub fn compactor(&self) -> &Compactor {
        &self.compactor
    }

    /// Inserts one triple into the row table (the immediate, indexable
    /// path) and also mirrors it into the batched writer's buffer so it
    /// is eventually captured in a chunk (spec §2 write data-flow: "C4
    /// inserts row (immediate) and the batched writer accumulates
    /// triples").
    pub async fn insert(&self, triple: Triple) -> StoreResult<()> {
        self.rows.insert(triple.clone())?;
        self.index_write(&triple).await;
        self.writer.add(triple).await
    }

    pub async fn insert_batch(&self, triples: Vec<Triple>) -> StoreResult<()> {
        self.rows.insert_batch(triples.clone())?;
        for triple in &triples {
            self.index_write(triple).await;
        }
        self.writer.add_batch(triples).await
    }

    pub fn get(&self, subject: &EntityId, predicate: &Predicate) -> Option<Triple> {
        self.rows.get(subject, predicate)
    }

    pub fn get_subject(&self, subject: &EntityId) -> Vec<Triple> {
        self.rows.get_subject(subject)
    }

    pub fn get_multi_subjects(
        &self,
        subjects: &[EntityId],
    ) -> std::collections::HashMap<EntityId, Vec<Triple>> {
        self.rows.get_multi_subjects(subjects)
    }

    pub fn get_by_predicate(&self, predicate: &Predicate) -> Vec<(EntityId, Triple)> {
        self.rows.get_by_predicate(predicate)
    }

    pub async fn update(
        &self,
        subject: EntityId,
        predicate: Predicate,
        value: TypedValue,
        tx_id: TransactionId,
        now_ms: u64,
    ) -> StoreResult<Triple> {
        let previous = self.rows.get(&subject, &predicate);
        let triple = self.rows.update(subject, predicate, value, tx_id, now_ms)?;
        if let Some(previous) = &previous {
            self.index_remove(previous).await;
        }
        self.index_write(&triple).await;
        self.writer.add(triple.clone()).await?;
        Ok(triple)
    }

    pub async fn delete(
        &self,
        subject: EntityId,
        predicate: Predicate,
        tx_id: TransactionId,
        now_ms: u64,
    ) -> StoreResult<Triple> {
        let previous = self.rows.get(&subject, &predicate);
        let triple = self.rows.delete(subject, predicate, tx_id, now_ms);
        if let Some(previous) = &previous {
            self.index_remove(previous).await;
        }
        self.writer.add(triple.clone()).await?;
        Ok(triple)
    }

    pub async fn delete_entity(
        &self,
        subject: &EntityId,
        tx_id: TransactionId,
        now_ms: u64,
    ) -> StoreResult<Vec<Triple>> {
        let previous = self.rows.get_subject(subject);
        let tombstones = self.rows.delete_entity(subject, tx_id, now_ms);
        for previous in &previous {
            self.index_remove(previous).await;
        }
        self.writer.add_batch(tombstones.clone()).await?;
        Ok(tombstones)
    }

    pub fn exists(&self, subject: &EntityId) -> bool {
        self.rows.exists(subject)
    }

    /// Feeds `triple` to the index sink, if one is attached. C6 is a
    /// supplementary query-acceleration structure, not the authoritative
    /// store, so a failure here is logged and does not fail the write.
    async fn index_write(&self, triple: &Triple) {
        if let Some(index) = &self.index {
            if let Err(e) = index.index_triple(triple).await {
                warn!(error = %e, subject = triple.subject.as_str(), "index update failed");
            }
        }
    }

    async fn index_remove(&self, triple: &Triple) {
        if let Some(index) = &self.index {
            if let Err(e) = index.remove_triple(triple).await {
                warn!(error = %e, subject = triple.subject.as_str(), "index removal failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlobError as ShardBlobError;
    use async_trait::async_trait;
    use edgegraph_types::TxIdGenerator;
    use std::sync::Mutex as StdMutex;

    struct FakeBlob {
        store: StdMutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    impl FakeBlob {
        fn new() -> Self {
            Self { store: StdMutex::new(std::collections::HashMap::new()) }
        }
    }

    #[async_trait]
    impl BlobStore for FakeBlob {
        async fn get(&self, key: &str) -> Result<Vec<u8>, ShardBlobError> {
            self.store.lock().unwrap().get(key).cloned().ok_or_else(|| ShardBlobError::NotFound(key.to_string()))
        }
        async fn put(&self, key: &str, body: Vec<u8>, _content_type: Option<&str>) -> Result<(), ShardBlobError> {
            self.store.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<(), ShardBlobError> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
        async fn list(&self, _prefix: &str, _cursor: Option<&str>, _limit: usize) -> Result<ListPage, ShardBlobError> {
            Ok(ListPage { keys: Vec::new(), next_cursor: None })
        }
    }

    struct NullSink;
    #[async_trait]
    impl ManifestSink for NullSink {
        async fn register_chunk(&self, _namespace: &str, _meta: ChunkMeta) -> StoreResult<()> {
            Ok(())
        }
    }

    fn shard() -> Shard {
        Shard::new(
            WriterConfig::new("https://ex.com"),
            Arc::new(FakeBlob::new()),
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn insert_is_visible_through_row_path() {
        let shard = shard();
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        let predicate = Predicate::parse("name").unwrap();
        shard
            .insert(Triple {
                subject: subject.clone(),
                predicate: predicate.clone(),
                object: TypedValue::String("a".into()),
                timestamp: 1,
                tx_id: gen.next(1),
            })
            .await
            .unwrap();
        assert_eq!(shard.get(&subject, &predicate).unwrap().object, TypedValue::String("a".into()));
    }

    #[tokio::test]
    async fn update_then_delete_round_trip() {
        let shard = shard();
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        let predicate = Predicate::parse("name").unwrap();
        shard.update(subject.clone(), predicate.clone(), TypedValue::String("a".into()), gen.next(1), 1).await.unwrap();
        assert!(shard.exists(&subject));
        shard.delete(subject.clone(), predicate.clone(), gen.next(2), 2).await.unwrap();
        assert!(shard.get(&subject, &predicate).is_none());
        assert!(!shard.exists(&subject));
    }

    struct RecordingIndex {
        indexed: StdMutex<Vec<Triple>>,
        removed: StdMutex<Vec<Triple>>,
    }

    impl RecordingIndex {
        fn new() -> Self {
            Self { indexed: StdMutex::new(Vec::new()), removed: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl IndexSink for RecordingIndex {
        async fn index_triple(&self, triple: &Triple) -> StoreResult<()> {
            self.indexed.lock().unwrap().push(triple.clone());
            Ok(())
        }
        async fn remove_triple(&self, triple: &Triple) -> StoreResult<()> {
            self.removed.lock().unwrap().push(triple.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn attached_index_sink_sees_inserts_and_the_superseded_value_on_update() {
        let index = Arc::new(RecordingIndex::new());
        let shard = Shard::new(WriterConfig::new("https://ex.com"), Arc::new(FakeBlob::new()), Arc::new(NullSink))
            .with_index_sink(index.clone());
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        let predicate = Predicate::parse("bio").unwrap();

        shard
            .insert(Triple {
                subject: subject.clone(),
                predicate: predicate.clone(),
                object: TypedValue::String("a".into()),
                timestamp: 1,
                tx_id: gen.next(1),
            })
            .await
            .unwrap();
        assert_eq!(index.indexed.lock().unwrap().len(), 1);

        shard.update(subject.clone(), predicate.clone(), TypedValue::String("b".into()), gen.next(2), 2).await.unwrap();
        assert_eq!(index.indexed.lock().unwrap().len(), 2);
        assert_eq!(index.removed.lock().unwrap().len(), 1);
        assert_eq!(index.removed.lock().unwrap()[0].object, TypedValue::String("a".into()));

        shard.delete(subject, predicate, gen.next(3), 3).await.unwrap();
        assert_eq!(index.removed.lock().unwrap().len(), 2);
        assert_eq!(index.removed.lock().unwrap()[1].object, TypedValue::String("b".into()));
    }
}
