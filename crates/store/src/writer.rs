//! The batched triple writer (spec §4.4): accumulates triples in memory,
//! flushes to a GraphCol chunk once a threshold is crossed, uploads it to
//! the blob store, folds the entity ids into a bloom filter, and notifies
//! a [`ManifestSink`] so the manifest store can register the new chunk.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use edgegraph_bloom::BloomFilter;
use edgegraph_chunk::encode_chunk;
use edgegraph_types::Triple;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::blob::{chunk_key, BlobStore};
use crate::error::{StoreError, StoreResult};

pub const DEFAULT_MAX_BUFFERED_TRIPLES: usize = 10_000;
pub const DEFAULT_MAX_PENDING_BATCHES: usize = 4;

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub namespace: String,
    pub max_buffered_triples: usize,
    pub max_buffered_bytes: usize,
    pub max_pending_batches: usize,
    pub backoff: BackoffConfig,
}

impl WriterConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            max_buffered_triples: DEFAULT_MAX_BUFFERED_TRIPLES,
            max_buffered_bytes: 64 * 1024 * 1024,
            max_pending_batches: DEFAULT_MAX_PENDING_BATCHES,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Metadata about one uploaded chunk, handed to the manifest store so it
/// can register a `ManifestFile` entry.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub chunk_id: String,
    pub key: String,
    pub footer_offset: u64,
    pub footer_size: u64,
    pub entity_count: usize,
}

/// Collaborator the writer notifies after each successful chunk upload.
/// Implemented by `edgegraph-manifest`'s manifest store; kept as a trait
/// here so `edgegraph-store` has no dependency on `edgegraph-manifest`.
#[async_trait]
pub trait ManifestSink: Send + Sync {
    async fn register_chunk(&self, namespace: &str, meta: ChunkMeta) -> StoreResult<()>;
}

/// Checkpointable progress, serializable so ingestion can resume after a
/// crash without re-uploading already-flushed chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterState {
    pub triples_written: u64,
    pub chunks_uploaded: Vec<String>,
    pub bloom_bytes: Vec<u8>,
}

/// Result of [`BatchedWriter::finalize`]: everything a caller needs to
/// record this ingestion run in a manifest.
#[derive(Debug, Clone)]
pub struct FinalizeMetadata {
    pub chunks: Vec<ChunkMeta>,
    pub combined_bloom: BloomFilter,
    pub total_triples: u64,
}

struct Buffer {
    triples: Vec<Triple>,
    approx_bytes: usize,
}

impl Buffer {
    fn new() -> Self {
        Self { triples: Vec::new(), approx_bytes: 0 }
    }
}

pub struct BatchedWriter {
    config: WriterConfig,
    blob: Arc<dyn BlobStore>,
    sink: Arc<dyn ManifestSink>,
    buffer: tokio::sync::Mutex<Buffer>,
    bloom: tokio::sync::Mutex<BloomFilter>,
    pending_uploads: Semaphore,
    triples_written: AtomicU64,
    chunk_ids: tokio::sync::Mutex<Vec<String>>,
    chunk_metas: tokio::sync::Mutex<Vec<ChunkMeta>>,
    chunk_seq: AtomicU64,
}

impl BatchedWriter {
    pub fn new(config: WriterConfig, blob: Arc<dyn BlobStore>, sink: Arc<dyn ManifestSink>) -> Self {
        let bloom = BloomFilter::new(edgegraph_bloom::DEFAULT_CAPACITY, edgegraph_bloom::DEFAULT_FPR);
        let max_pending = config.max_pending_batches.max(1);
        Self {
            config,
            blob,
            sink,
            buffer: tokio::sync::Mutex::new(Buffer::new()),
            bloom: tokio::sync::Mutex::new(bloom),
            pending_uploads: Semaphore::new(max_pending),
            triples_written: AtomicU64::new(0),
            chunk_ids: tokio::sync::Mutex::new(Vec::new()),
            chunk_metas: tokio::sync::Mutex::new(Vec::new()),
            chunk_seq: AtomicU64::new(0),
        }
    }

    /// True while all upload slots are occupied; producers can poll this
    /// before calling `add` to avoid blocking, though `add` itself will
    /// suspend until a slot frees regardless.
    pub fn is_backpressured(&self) -> bool {
        self.pending_uploads.available_permits() == 0
    }

    pub async fn add(&self, triple: Triple) -> StoreResult<()> {
        let should_flush = {
            let mut buf = self.buffer.lock().await;
            buf.approx_bytes += estimate_size(&triple);
            buf.triples.push(triple);
            buf.triples.len() >= self.config.max_buffered_triples || buf.approx_bytes >= self.config.max_buffered_bytes
        };
        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn add_batch(&self, triples: Vec<Triple>) -> StoreResult<()> {
        for t in triples {
            self.add(t).await?;
        }
        Ok(())
    }

    /// Forces an upload of whatever is currently buffered, even if under
    /// threshold. No-op if the buffer is empty.
    pub async fn flush(&self) -> StoreResult<()> {
        let drained = {
            let mut buf = self.buffer.lock().await;
            if buf.triples.is_empty() {
                return Ok(());
            }
            std::mem::replace(&mut *buf, Buffer::new())
        };
        self.upload_chunk(drained.triples).await
    }

    async fn upload_chunk(&self, triples: Vec<Triple>) -> StoreResult<()> {
        let _permit = self.pending_uploads.acquire().await.expect("semaphore never closed");

        let entity_ids: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            triples
                .iter()
                .filter(|t| seen.insert(t.subject.as_str().to_string()))
                .map(|t| t.subject.as_str().to_string())
                .collect()
        };
        let encoded = encode_chunk(&triples, &self.config.namespace);
        let chunk_id = format!("chunk-{:016x}", self.chunk_seq.fetch_add(1, Ordering::Relaxed));
        let key = chunk_key(&self.config.namespace, &chunk_id);

        let mut backoff = Backoff::new(self.config.backoff);
        loop {
            match self.blob.put(&key, encoded.bytes.clone(), Some("application/octet-stream")).await {
                Ok(()) => break,
                Err(e) => {
                    warn!(attempt = backoff.attempt(), error = %e, "chunk upload failed");
                    match backoff.next_delay() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(StoreError::UploadExhausted { attempts: backoff.attempt(), last_error: e.to_string() }),
                    }
                }
            }
        }

        {
            let mut bloom = self.bloom.lock().await;
            for id in &entity_ids {
                bloom.add(id);
            }
        }

        let meta = ChunkMeta {
            chunk_id: chunk_id.clone(),
            key,
            footer_offset: encoded.footer_offset,
            footer_size: encoded.footer_size,
            entity_count: entity_ids.len(),
        };
        self.sink.register_chunk(&self.config.namespace, meta.clone()).await?;

        self.triples_written.fetch_add(triples.len() as u64, Ordering::Relaxed);
        self.chunk_ids.lock().await.push(chunk_id);
        self.chunk_metas.lock().await.push(meta);
        info!(entities = entity_ids.len(), triples = triples.len(), "chunk uploaded");
        Ok(())
    }

    /// Flushes any remainder and returns manifest-ready summary metadata.
    pub async fn finalize(&self) -> StoreResult<FinalizeMetadata> {
        self.flush().await?;
        let bloom = self.bloom.lock().await.clone();
        let chunks = self.chunk_metas.lock().await.clone();
        Ok(FinalizeMetadata { chunks, combined_bloom: bloom, total_triples: self.triples_written.load(Ordering::Relaxed) })
    }

    pub async fn state(&self) -> WriterState {
        let bloom = self.bloom.lock().await;
        WriterState {
            triples_written: self.triples_written.load(Ordering::Relaxed),
            chunks_uploaded: self.chunk_ids.lock().await.clone(),
            bloom_bytes: bloom.serialize(),
        }
    }

    pub async fn restore_state(&self, state: WriterState) -> StoreResult<()> {
        let restored = BloomFilter::deserialize(&state.bloom_bytes).map_err(|e| StoreError::RowParse {
            column: "bloom_bytes",
            detail: e.to_string(),
        })?;
        *self.bloom.lock().await = restored;
        *self.chunk_ids.lock().await = state.chunks_uploaded;
        self.triples_written.store(state.triples_written, Ordering::Relaxed);
        Ok(())
    }
}

fn estimate_size(triple: &Triple) -> usize {
    // Coarse estimate for the byte-size flush threshold; exactness isn't
    // required, only monotonic growth with payload size.
    triple.subject.as_str().len() + triple.predicate.as_str().len() + 64
}
