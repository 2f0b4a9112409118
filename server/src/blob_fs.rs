//! A local-filesystem-backed [`BlobStore`] (SPEC_FULL.md §2 "Object-store
//! adapter"): keys map onto paths under a root directory, so the
//! workspace runs end-to-end without a real R2 account. Grounded on
//! `storage_engine`'s `MemoryEngine` pattern (pack repo
//! `Ian-Reitsma-the-block`) of one trait with a production backend and a
//! deterministic local one standing in for it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use edgegraph_store::{BlobError, BlobStore, ListPage};

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Blob keys are forward-slash-delimited R2-style paths (see
        // `edgegraph_store::{chunk_key, manifest_key}`); joining them onto
        // the root mirrors that hierarchy on disk.
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key);
        tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: Option<&str>) -> Result<(), BlobError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(&path, body).await.map_err(|e| io_error(&path, e))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<ListPage, BlobError> {
        let dir = self.path_for(prefix);
        let mut keys = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                    if let Some(name) = entry.file_name().to_str() {
                        keys.push(format!("{prefix}/{name}"));
                    }
                }
            }
        }
        keys.sort();
        let start = match cursor {
            Some(c) => keys.iter().position(|k| k == c).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        let page: Vec<String> = keys[start..].iter().take(limit).cloned().collect();
        let next_cursor = if start + page.len() < keys.len() { page.last().cloned() } else { None };
        Ok(ListPage { keys: page, next_cursor })
    }
}

fn io_error(path: &Path, e: std::io::Error) -> BlobError {
    if e.kind() == std::io::ErrorKind::NotFound {
        BlobError::NotFound(path.display().to_string())
    } else {
        BlobError::Io(format!("{}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("ns/_chunks/c1.gcol", b"hello".to_vec(), None).await.unwrap();
        let back = store.get("ns/_chunks/c1.gcol").await.unwrap();
        assert_eq!(back, b"hello");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("k", b"v".to_vec(), None).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn list_paginates_by_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        for i in 0..5 {
            store.put(&format!("ns/e{i}"), vec![i as u8], None).await.unwrap();
        }
        let first = store.list("ns", None, 2).await.unwrap();
        assert_eq!(first.keys.len(), 2);
        assert!(first.next_cursor.is_some());
        let second = store.list("ns", first.next_cursor.as_deref(), 10).await.unwrap();
        assert_eq!(second.keys.len(), 3);
    }
}
