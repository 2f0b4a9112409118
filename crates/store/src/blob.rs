//! The blob-store collaborator interface (spec §6). `edgegraph-store` only
//! consumes this trait; `edgegraph-server` supplies the concrete backend
//! (a local-filesystem adapter for standalone runs; a real deployment
//! would bind an R2-backed implementation here instead).

use async_trait::async_trait;

use crate::error::BlobError;

/// One page of a `list` call.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    async fn put(&self, key: &str, body: Vec<u8>, content_type: Option<&str>) -> Result<(), BlobError>;
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<ListPage, BlobError>;
}

/// Deterministic key for a chunk file, per spec §6: reversed-namespace
/// prefix, `_chunks` segment, chunk id, `.gcol` extension.
pub fn chunk_key(namespace: &str, chunk_id: &str) -> String {
    format!("{}/_chunks/{chunk_id}.gcol", reverse_namespace(namespace))
}

/// Deterministic key for a namespace's manifest JSON.
pub fn manifest_key(namespace: &str) -> String {
    format!("{}/_manifest.json", reverse_namespace(namespace))
}

/// Deterministic key for one vector under a predicate.
pub fn vector_key(predicate: &str, entity_id: &str) -> String {
    format!("vectors/{predicate}/{entity_id}")
}

/// `https://a.b.c/path` -> `.c/.b/.a/path`, so a prefix listing returns
/// every entity under a namespace regardless of how deep its path is.
pub fn reverse_namespace(namespace: &str) -> String {
    let without_scheme = namespace
        .strip_prefix("https://")
        .or_else(|| namespace.strip_prefix("http://"))
        .unwrap_or(namespace);
    let (host, rest) = match without_scheme.split_once('/') {
        Some((h, r)) => (h, Some(r)),
        None => (without_scheme, None),
    };
    let reversed_host: String = host
        .split('.')
        .rev()
        .map(|label| format!(".{label}"))
        .collect::<Vec<_>>()
        .join("/");
    match rest {
        Some(r) if !r.is_empty() => format!("{reversed_host}/{r}"),
        _ => reversed_host,
    }
}
