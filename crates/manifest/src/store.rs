//! The manifest store proper (spec §4.5): per-namespace CRUD over chunk
//! file metadata and the entity index, an LRU read-through cache in front
//! of local storage, and the R2<->local sync protocol.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{info, warn};

use edgegraph_store::{manifest_key, BlobStore, ChunkMeta, ManifestSink};
use edgegraph_types::EntityId;

use crate::error::{ManifestError, ManifestResult, SyncErrorCode};
use crate::local::LocalManifestStorage;
use crate::model::{self, EntityLocation, ManifestFile, NamespaceManifest};

pub const DEFAULT_MAX_CACHED_NAMESPACES: usize = 64;
pub const DEFAULT_MAX_ENTITIES_PER_NAMESPACE: usize = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ManifestStoreConfig {
    pub max_cached_namespaces: usize,
    pub max_entities_per_namespace: usize,
}

impl Default for ManifestStoreConfig {
    fn default() -> Self {
        Self {
            max_cached_namespaces: DEFAULT_MAX_CACHED_NAMESPACES,
            max_entities_per_namespace: DEFAULT_MAX_ENTITIES_PER_NAMESPACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    FromR2,
    ToR2,
    Bidirectional,
    NoOp,
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub direction: SyncDirection,
    pub entries_updated: usize,
    pub conflicts: usize,
    pub error: Option<String>,
    pub error_code: Option<SyncErrorCode>,
}

impl SyncResult {
    fn no_op() -> Self {
        Self { direction: SyncDirection::NoOp, entries_updated: 0, conflicts: 0, error: None, error_code: None }
    }

    fn failure(error: ManifestError) -> Self {
        let code = error.sync_error_code();
        Self { direction: SyncDirection::NoOp, entries_updated: 0, conflicts: 0, error: Some(error.to_string()), error_code: code }
    }
}

#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub namespace: String,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub last_synced_at: Option<u64>,
    pub in_sync: bool,
}

impl SyncStatus {
    fn unknown(namespace: &str) -> Self {
        Self { namespace: namespace.to_string(), local_version: None, remote_version: None, last_synced_at: None, in_sync: false }
    }
}

pub struct ManifestStore {
    config: ManifestStoreConfig,
    remote: Arc<dyn BlobStore>,
    local: Arc<dyn LocalManifestStorage>,
    cache: Mutex<LruCache<String, Arc<NamespaceManifest>>>,
    sync_status: Mutex<HashMap<String, SyncStatus>>,
}

impl ManifestStore {
    pub fn new(config: ManifestStoreConfig, remote: Arc<dyn BlobStore>, local: Arc<dyn LocalManifestStorage>) -> Self {
        let cap = std::num::NonZeroUsize::new(config.max_cached_namespaces.max(1)).expect("max > 0");
        Self { config, remote, local, cache: Mutex::new(LruCache::new(cap)), sync_status: Mutex::new(HashMap::new()) }
    }

    // --- manifest-file level operations (spec §4.5) ---------------------

    /// Registers (or replaces, by path) one chunk file under `namespace`.
    pub async fn put_manifest(&self, namespace: &str, file: ManifestFile, now_ms: u64) -> ManifestResult<()> {
        let mut manifest = self.read_local(namespace).await?.unwrap_or_else(|| NamespaceManifest::empty(namespace, now_ms));
        if let Some(existing) = manifest.files.iter_mut().find(|f| f.path == file.path) {
            *existing = file;
        } else {
            manifest.files.push(file);
        }
        manifest.version = next_version(&manifest.version);
        self.write_local(namespace, &manifest).await
    }

    pub async fn get_manifest(&self, namespace: &str, path: &str) -> ManifestResult<Option<ManifestFile>> {
        let manifest = self.ensure_cached(namespace).await?;
        Ok(manifest.files.iter().find(|f| f.path == path).cloned())
    }

    pub async fn list_manifests(&self) -> ManifestResult<Vec<(String, ManifestFile)>> {
        let mut out = Vec::new();
        for namespace in self.local.list_namespaces().await? {
            if let Ok(manifest) = self.ensure_cached(&namespace).await {
                out.extend(manifest.files.iter().cloned().map(|f| (namespace.clone(), f)));
            }
        }
        Ok(out)
    }

    pub async fn list_manifests_for_namespace(&self, namespace: &str) -> ManifestResult<Vec<ManifestFile>> {
        Ok(self.ensure_cached(namespace).await?.files.clone())
    }

    pub async fn delete_manifest(&self, namespace: &str, path: &str) -> ManifestResult<()> {
        let Some(mut manifest) = self.read_local(namespace).await? else { return Ok(()) };
        manifest.files.retain(|f| f.path != path);
        self.write_local(namespace, &manifest).await
    }

    // --- entity-index level operations -----------------------------------

    pub async fn put_entity_index(&self, namespace: &str, entries: Vec<(EntityId, EntityLocation)>, now_ms: u64) -> ManifestResult<()> {
        let mut manifest = self.read_local(namespace).await?.unwrap_or_else(|| NamespaceManifest::empty(namespace, now_ms));
        for (id, loc) in entries {
            manifest.entity_index.insert(id, loc);
        }
        manifest.version = next_version(&manifest.version);
        self.write_local(namespace, &manifest).await
    }

    pub async fn load_entity_index(&self, namespace: &str) -> ManifestResult<Arc<NamespaceManifest>> {
        self.ensure_cached(namespace).await
    }

    pub async fn lookup_entity(&self, namespace: &str, entity_id: &EntityId) -> ManifestResult<Option<EntityLocation>> {
        match self.ensure_cached(namespace).await {
            Ok(manifest) => Ok(manifest.entity_index.get(entity_id).cloned()),
            Err(ManifestError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_entity_index(&self, namespace: &str) -> ManifestResult<()> {
        let Some(mut manifest) = self.read_local(namespace).await? else { return Ok(()) };
        manifest.entity_index.clear();
        self.write_local(namespace, &manifest).await
    }

    pub async fn is_stale(&self, namespace: &str, version: &str) -> ManifestResult<bool> {
        match self.read_local(namespace).await? {
            Some(manifest) => Ok(manifest.version != version),
            None => Ok(true),
        }
    }

    // --- R2 import/export -------------------------------------------------

    pub async fn import_from_r2_json(&self, bytes: &[u8]) -> ManifestResult<()> {
        let manifest = model::deserialize(bytes)?;
        self.write_local(&manifest.namespace.clone(), &manifest).await
    }

    pub async fn export_to_r2(&self, namespace: &str) -> ManifestResult<Vec<u8>> {
        let manifest = self.read_local(namespace).await?.ok_or_else(|| ManifestError::NotFound(namespace.to_string()))?;
        Ok(model::serialize(&manifest))
    }

    // --- sync protocol (spec §4.5) -----------------------------------------

    pub async fn needs_sync(&self, namespace: &str) -> ManifestResult<bool> {
        let local_version = self.read_local(namespace).await?.map(|m| m.version);
        let remote = self.fetch_remote(namespace).await;
        match (local_version, remote) {
            (None, _) => Ok(true),
            (Some(_), Err(_)) => Ok(false),
            (Some(_), Ok(None)) => Ok(false),
            (Some(local), Ok(Some(remote))) => Ok(local != remote.version),
        }
    }

    pub async fn sync_from_r2(&self, namespace: &str, now_ms: u64) -> ManifestResult<SyncResult> {
        let bytes = match self.remote.get(&manifest_key(namespace)).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(SyncResult::failure(ManifestError::RemoteFetch(e.to_string()))),
        };
        let imported = match model::deserialize(&bytes) {
            Ok(m) => m,
            Err(e) => return Ok(SyncResult::failure(e)),
        };
        let entries = imported.entity_index.len();
        if let Err(e) = self.write_local(namespace, &imported).await {
            return Ok(SyncResult::failure(e));
        }
        self.record_sync(namespace, Some(imported.version.clone()), Some(imported.version), now_ms);
        info!(namespace, entries, "synced manifest from remote");
        Ok(SyncResult { direction: SyncDirection::FromR2, entries_updated: entries, conflicts: 0, error: None, error_code: None })
    }

    pub async fn sync_to_r2(&self, namespace: &str) -> ManifestResult<SyncResult> {
        let Some(manifest) = self.read_local(namespace).await? else {
            return Ok(SyncResult::failure(ManifestError::NotFound(namespace.to_string())));
        };
        let bytes = model::serialize(&manifest);
        let entries = manifest.entity_index.len();
        // No retry at this layer, per spec §4.5: the caller decides whether
        // to retry a `syncToR2` failure.
        if let Err(e) = self.remote.put(&manifest_key(namespace), bytes, Some("application/json")).await {
            return Ok(SyncResult::failure(ManifestError::RemoteWrite(e.to_string())));
        }
        Ok(SyncResult { direction: SyncDirection::ToR2, entries_updated: entries, conflicts: 0, error: None, error_code: None })
    }

    /// Picks a sync direction based on which side is empty, or merges
    /// bidirectionally (R2 winning any conflicting entity location) when
    /// both sides are non-empty with differing versions (spec §4.5, S5).
    pub async fn full_sync(&self, namespace: &str, now_ms: u64) -> ManifestResult<SyncResult> {
        let local = self.read_local(namespace).await?;
        let local_empty = local.as_ref().map(|m| m.is_empty()).unwrap_or(true);
        let remote = self.fetch_remote(namespace).await;

        let remote = match remote {
            Err(e) => return Ok(SyncResult::failure(e)),
            Ok(r) => r,
        };
        let remote_empty = remote.as_ref().map(|m| m.is_empty()).unwrap_or(true);

        if local_empty && remote_empty {
            return Ok(SyncResult::no_op());
        }
        if local_empty {
            return self.sync_from_r2(namespace, now_ms).await;
        }
        if remote_empty {
            return self.sync_to_r2(namespace).await;
        }

        let local = local.expect("checked non-empty above");
        let remote = remote.expect("checked non-empty above");
        if local.version == remote.version {
            self.record_sync(namespace, Some(local.version.clone()), Some(remote.version.clone()), now_ms);
            return Ok(SyncResult::no_op());
        }

        let (merged, conflicts) = merge_bidirectional(local, remote);
        let entries_updated = merged.entity_index.len();
        self.write_local(namespace, &merged).await?;
        self.record_sync(namespace, Some(merged.version.clone()), Some(merged.version.clone()), now_ms);
        info!(namespace, conflicts, entries_updated, "bidirectional manifest sync resolved");
        Ok(SyncResult { direction: SyncDirection::Bidirectional, entries_updated, conflicts, error: None, error_code: None })
    }

    pub fn get_sync_status(&self, namespace: &str) -> SyncStatus {
        self.sync_status.lock().get(namespace).cloned().unwrap_or_else(|| SyncStatus::unknown(namespace))
    }

    pub async fn get_sync_status_async(&self, namespace: &str) -> ManifestResult<SyncStatus> {
        let local_version = self.read_local(namespace).await?.map(|m| m.version);
        let remote_version = self.fetch_remote(namespace).await.ok().flatten().map(|m| m.version);
        let in_sync = matches!((&local_version, &remote_version), (Some(l), Some(r)) if l == r);
        let status = SyncStatus {
            namespace: namespace.to_string(),
            local_version,
            remote_version,
            last_synced_at: self.sync_status.lock().get(namespace).and_then(|s| s.last_synced_at),
            in_sync,
        };
        self.sync_status.lock().insert(namespace.to_string(), status.clone());
        Ok(status)
    }

    // --- internals ----------------------------------------------------------

    async fn ensure_cached(&self, namespace: &str) -> ManifestResult<Arc<NamespaceManifest>> {
        if let Some(hit) = self.cache.lock().get(namespace) {
            return Ok(hit.clone());
        }
        let manifest = self.read_local(namespace).await?.ok_or_else(|| ManifestError::NotFound(namespace.to_string()))?;
        let arc = Arc::new(manifest);
        if arc.entity_index.len() <= self.config.max_entities_per_namespace {
            self.cache.lock().put(namespace.to_string(), arc.clone());
        } else {
            warn!(namespace, entities = arc.entity_index.len(), "namespace exceeds cache entity cap, serving uncached");
        }
        Ok(arc)
    }

    fn invalidate_cache(&self, namespace: &str) {
        self.cache.lock().pop(namespace);
    }

    async fn read_local(&self, namespace: &str) -> ManifestResult<Option<NamespaceManifest>> {
        if let Some(hit) = self.cache.lock().peek(namespace) {
            return Ok(Some((**hit).clone()));
        }
        match self.local.get(namespace).await? {
            Some(bytes) => Ok(Some(model::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_local(&self, namespace: &str, manifest: &NamespaceManifest) -> ManifestResult<()> {
        self.local.put(namespace, model::serialize(manifest)).await?;
        self.invalidate_cache(namespace);
        Ok(())
    }

    async fn fetch_remote(&self, namespace: &str) -> ManifestResult<Option<NamespaceManifest>> {
        match self.remote.get(&manifest_key(namespace)).await {
            Ok(bytes) => Ok(Some(model::deserialize(&bytes)?)),
            Err(edgegraph_store::BlobError::NotFound(_)) => Ok(None),
            Err(e) => Err(ManifestError::RemoteFetch(e.to_string())),
        }
    }

    fn record_sync(&self, namespace: &str, local_version: Option<String>, remote_version: Option<String>, now_ms: u64) {
        let in_sync = matches!((&local_version, &remote_version), (Some(l), Some(r)) if l == r);
        self.sync_status.lock().insert(
            namespace.to_string(),
            SyncStatus { namespace: namespace.to_string(), local_version, remote_version, last_synced_at: Some(now_ms), in_sync },
        );
    }
}

/// Merges two non-empty, differently-versioned manifests. R2 (`remote`)
/// wins on any entity key the two sides disagree on; a "conflict" is any
/// key present in exactly one side or present in both with a different
/// location, matching spec §4.5's "bidirectional with R2 winning
/// conflicts, count of resolved conflicts returned."
fn merge_bidirectional(local: NamespaceManifest, remote: NamespaceManifest) -> (NamespaceManifest, usize) {
    let mut merged_entities = local.entity_index.clone();
    let mut conflicts = 0usize;
    let keys: HashSet<&EntityId> = local.entity_index.keys().chain(remote.entity_index.keys()).collect();
    for key in keys {
        let local_loc = local.entity_index.get(key);
        let remote_loc = remote.entity_index.get(key);
        if local_loc != remote_loc {
            conflicts += 1;
        }
        if let Some(loc) = remote_loc {
            merged_entities.insert(key.clone(), loc.clone());
        }
    }

    let mut merged_files = local.files.clone();
    for file in &remote.files {
        if let Some(pos) = merged_files.iter().position(|f| f.path == file.path) {
            merged_files[pos] = file.clone();
        } else {
            merged_files.push(file.clone());
        }
    }

    let merged = NamespaceManifest {
        namespace: local.namespace,
        version: remote.version,
        files: merged_files,
        entity_index: merged_entities,
        created_at: local.created_at.min(remote.created_at),
    };
    (merged, conflicts)
}

fn next_version(current: &str) -> String {
    match current.parse::<u64>() {
        Ok(n) => (n + 1).to_string(),
        Err(_) => format!("{current}+1"),
    }
}

/// Lets `edgegraph-store`'s `BatchedWriter` register newly uploaded chunks
/// directly into the manifest store (spec §2 write data flow: "...emits
/// chunk files via C2, updates C3 bloom, and registers them in C5").
#[async_trait]
impl ManifestSink for ManifestStore {
    async fn register_chunk(&self, namespace: &str, meta: ChunkMeta) -> edgegraph_store::StoreResult<()> {
        let file = ManifestFile {
            path: meta.key,
            footer_offset: meta.footer_offset,
            footer_size: meta.footer_size,
            entity_count: meta.entity_count,
            version: meta.chunk_id,
            updated_at: 0,
        };
        self.put_manifest(namespace, file, 0)
            .await
            .map_err(|e| edgegraph_store::StoreError::Blob(edgegraph_store::BlobError::Io(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemoryLocalManifestStorage;
    use async_trait::async_trait;
    use edgegraph_store::{BlobError, ListPage};
    use std::sync::Mutex as StdMutex;

    struct FakeRemote {
        store: StdMutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self { store: StdMutex::new(HashMap::new()) }
        }

        fn seed(&self, namespace: &str, manifest: &NamespaceManifest) {
            self.store.lock().unwrap().insert(manifest_key(namespace), model::serialize(manifest));
        }
    }

    #[async_trait]
    impl BlobStore for FakeRemote {
        async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
            self.store.lock().unwrap().get(key).cloned().ok_or_else(|| BlobError::NotFound(key.to_string()))
        }
        async fn put(&self, key: &str, body: Vec<u8>, _content_type: Option<&str>) -> Result<(), BlobError> {
            self.store.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<(), BlobError> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
        async fn list(&self, _prefix: &str, _cursor: Option<&str>, _limit: usize) -> Result<ListPage, BlobError> {
            Ok(ListPage { keys: Vec::new(), next_cursor: None })
        }
    }

    fn store_with_remote() -> (ManifestStore, Arc<FakeRemote>) {
        let remote = Arc::new(FakeRemote::new());
        let store = ManifestStore::new(
            ManifestStoreConfig::default(),
            remote.clone() as Arc<dyn BlobStore>,
            Arc::new(InMemoryLocalManifestStorage::new()),
        );
        (store, remote)
    }

    fn manifest_with_one_entity(namespace: &str, version: &str, entity: &str) -> NamespaceManifest {
        let mut m = NamespaceManifest::empty(namespace, 0);
        m.version = version.to_string();
        m.entity_index.insert(
            EntityId::parse(format!("https://ex.com/{entity}")).unwrap(),
            EntityLocation { file_path: "chunk-1.gcol".to_string(), byte_offset: 0, byte_length: 10 },
        );
        m
    }

    #[tokio::test]
    async fn s5_full_sync_from_empty_local() {
        let (store, remote) = store_with_remote();
        let seeded = manifest_with_one_entity("https://ex.com", "1.0.0", "e1");
        remote.seed("https://ex.com", &seeded);

        let result = store.full_sync("https://ex.com", 1000).await.unwrap();
        assert_eq!(result.direction, SyncDirection::FromR2);
        assert_eq!(result.entries_updated, 1);
        assert_eq!(result.conflicts, 0);

        let looked_up = store
            .lookup_entity("https://ex.com", &EntityId::parse("https://ex.com/e1").unwrap())
            .await
            .unwrap();
        assert!(looked_up.is_some());
    }

    #[tokio::test]
    async fn s5_full_sync_bidirectional_with_one_conflict() {
        let (store, remote) = store_with_remote();
        let v1 = manifest_with_one_entity("https://ex.com", "1.0.0", "e1");
        remote.seed("https://ex.com", &v1);
        store.full_sync("https://ex.com", 1000).await.unwrap();

        let mut v2 = manifest_with_one_entity("https://ex.com", "2.0.0", "e1");
        v2.entity_index.insert(
            EntityId::parse("https://ex.com/e2").unwrap(),
            EntityLocation { file_path: "chunk-2.gcol".to_string(), byte_offset: 0, byte_length: 10 },
        );
        remote.seed("https://ex.com", &v2);

        let result = store.full_sync("https://ex.com", 2000).await.unwrap();
        assert_eq!(result.direction, SyncDirection::Bidirectional);
        assert_eq!(result.conflicts, 1);

        let looked_up = store
            .lookup_entity("https://ex.com", &EntityId::parse("https://ex.com/e2").unwrap())
            .await
            .unwrap();
        assert!(looked_up.is_some());
    }

    #[tokio::test]
    async fn concurrent_sync_from_r2_is_idempotent() {
        let (store, remote) = store_with_remote();
        let seeded = manifest_with_one_entity("https://ex.com", "1.0.0", "e1");
        remote.seed("https://ex.com", &seeded);
        let store = Arc::new(store);

        let a = store.clone();
        let b = store.clone();
        let (r1, r2) = tokio::join!(a.sync_from_r2("https://ex.com", 1000), b.sync_from_r2("https://ex.com", 1000));
        r1.unwrap();
        r2.unwrap();

        let status = store.get_sync_status_async("https://ex.com").await.unwrap();
        assert_eq!(status.local_version.as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn needs_sync_detects_version_drift() {
        let (store, remote) = store_with_remote();
        let seeded = manifest_with_one_entity("https://ex.com", "1.0.0", "e1");
        remote.seed("https://ex.com", &seeded);
        assert!(store.needs_sync("https://ex.com").await.unwrap());
        store.sync_from_r2("https://ex.com", 1000).await.unwrap();
        assert!(!store.needs_sync("https://ex.com").await.unwrap());
    }
}
