use thiserror::Error;

use edgegraph_chunk::ChunkCodecError;
use edgegraph_types::ValidationError;

/// Errors surfaced by a shard's row table, batched writer, and compactor.
/// Variants map onto the taxonomy's Validation / Parse-codec / Resource /
/// Concurrency buckets (spec §7).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("triple failed validation: {0:?}")]
    Validation(Vec<ValidationError>),
    #[error("row column {column} could not be decoded: {detail}")]
    RowParse { column: &'static str, detail: String },
    #[error(transparent)]
    ChunkCodec(#[from] ChunkCodecError),
    #[error("blob store operation failed: {0}")]
    Blob(#[from] BlobError),
    #[error("chunk upload failed after {attempts} attempts: {last_error}")]
    UploadExhausted { attempts: u32, last_error: String },
    #[error("no migration path from schema version {from} to {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("index update failed: {0}")]
    Index(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the external blob-store collaborator (spec §6).
#[derive(Debug, Error, Clone)]
pub enum BlobError {
    #[error("object {0:?} not found")]
    NotFound(String),
    #[error("blob store I/O failure: {0}")]
    Io(String),
    #[error("blob store request unauthorized")]
    Unauthorized,
}
