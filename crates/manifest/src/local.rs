//! The local (DO-like) persistence collaborator: a cache of the R2 source
//! of truth, fast-path-readable without a network round trip. Modeled as
//! a trait so `edgegraph-server` can back it with whatever persistent
//! store it wires up; this crate ships an in-memory implementation for
//! tests and single-process local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ManifestResult;

#[async_trait]
pub trait LocalManifestStorage: Send + Sync {
    async fn get(&self, namespace: &str) -> ManifestResult<Option<Vec<u8>>>;
    async fn put(&self, namespace: &str, bytes: Vec<u8>) -> ManifestResult<()>;
    async fn delete(&self, namespace: &str) -> ManifestResult<()>;
    async fn list_namespaces(&self) -> ManifestResult<Vec<String>>;
}

#[derive(Default)]
pub struct InMemoryLocalManifestStorage {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryLocalManifestStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalManifestStorage for InMemoryLocalManifestStorage {
    async fn get(&self, namespace: &str) -> ManifestResult<Option<Vec<u8>>> {
        Ok(self.inner.read().get(namespace).cloned())
    }

    async fn put(&self, namespace: &str, bytes: Vec<u8>) -> ManifestResult<()> {
        self.inner.write().insert(namespace.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> ManifestResult<()> {
        self.inner.write().remove(namespace);
        Ok(())
    }

    async fn list_namespaces(&self) -> ManifestResult<Vec<String>> {
        Ok(self.inner.read().keys().cloned().collect())
    }
}
