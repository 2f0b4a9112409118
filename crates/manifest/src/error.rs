use thiserror::Error;

use edgegraph_store::BlobError;
use edgegraph_types::ValidationError;

/// Errors surfaced by the manifest store and its R2<->local sync protocol.
/// `errorCode` in spec §4.5's `SyncResult` corresponds to the discriminant
/// of [`ManifestError`] here.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest for namespace {0:?} not found")]
    NotFound(String),
    #[error("remote manifest JSON is malformed: {0}")]
    MalformedRemote(String),
    #[error("local manifest storage is malformed: {0}")]
    MalformedLocal(String),
    #[error("entity id failed validation: {0}")]
    InvalidEntity(#[from] ValidationError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),
    #[error("remote write failed: {0}")]
    RemoteWrite(String),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// The discriminant spec §4.5 calls `errorCode` on a failed [`SyncResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCode {
    FetchFailed,
    MalformedJson,
    WriteFailed,
}

impl ManifestError {
    pub fn sync_error_code(&self) -> Option<SyncErrorCode> {
        match self {
            ManifestError::RemoteFetch(_) | ManifestError::Blob(BlobError::NotFound(_)) => {
                Some(SyncErrorCode::FetchFailed)
            }
            ManifestError::MalformedRemote(_) => Some(SyncErrorCode::MalformedJson),
            ManifestError::RemoteWrite(_) => Some(SyncErrorCode::WriteFailed),
            _ => None,
        }
    }
}
