//! The manifest shapes (spec §4.5, §6): a per-namespace list of chunk
//! files plus an entity->byte-range index, and the JSON wire shape
//! (`R2Manifest`) exchanged with the blob-store collaborator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use edgegraph_types::EntityId;

use crate::error::{ManifestError, ManifestResult};

/// One chunk file registered for a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFile {
    pub path: String,
    pub footer_offset: u64,
    pub footer_size: u64,
    pub entity_count: usize,
    pub version: String,
    pub updated_at: u64,
}

/// Where one entity's triples live: which chunk file, and the byte range
/// within it (as produced by [`edgegraph_chunk::decode_chunk_footer`]'s
/// entity index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLocation {
    pub file_path: String,
    pub byte_offset: u64,
    pub byte_length: u64,
}

/// The in-memory/local-persisted representation of one namespace's
/// manifest: everything a reader needs to turn an entity id into a byte
/// range without touching the blob store's remote listing.
#[derive(Debug, Clone)]
pub struct NamespaceManifest {
    pub namespace: String,
    pub version: String,
    pub files: Vec<ManifestFile>,
    pub entity_index: HashMap<EntityId, EntityLocation>,
    pub created_at: u64,
}

impl NamespaceManifest {
    pub fn empty(namespace: impl Into<String>, created_at: u64) -> Self {
        Self {
            namespace: namespace.into(),
            version: "0".to_string(),
            files: Vec::new(),
            entity_index: HashMap::new(),
            created_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entity_index.is_empty() && self.files.is_empty()
    }
}

// --- R2 wire shape -----------------------------------------------------

/// The JSON shape exchanged with the blob-store collaborator at
/// `<reversed_namespace>/_manifest.json` (spec §6). Named for the R2
/// object store the source targets; structurally identical to
/// [`NamespaceManifest`] modulo the entity index being a flat array
/// (JSON has no map-with-struct-key notion) instead of a `HashMap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct R2Manifest {
    pub namespace: String,
    pub version: String,
    pub files: Vec<R2ManifestFile>,
    #[serde(rename = "entityIndex")]
    pub entity_index: Vec<R2EntityIndexEntry>,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct R2ManifestFile {
    pub path: String,
    #[serde(rename = "footerOffset")]
    pub footer_offset: u64,
    #[serde(rename = "footerSize")]
    pub footer_size: u64,
    #[serde(rename = "entityCount")]
    pub entity_count: usize,
    pub version: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct R2EntityIndexEntry {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "byteOffset")]
    pub byte_offset: u64,
    #[serde(rename = "byteLength")]
    pub byte_length: u64,
}

/// Validates and converts a wire-format manifest into the local shape.
/// Rejects (rather than silently drops) an entity id that fails
/// [`EntityId::parse`] — a malformed remote manifest is a `Parse/codec`
/// error, not a partial success (spec §7).
pub fn import_from_r2(m: R2Manifest) -> ManifestResult<NamespaceManifest> {
    let mut entity_index = HashMap::with_capacity(m.entity_index.len());
    for entry in m.entity_index {
        let id = EntityId::parse(entry.entity_id.clone())
            .map_err(|e| ManifestError::MalformedRemote(format!("entity id {:?}: {e}", entry.entity_id)))?;
        entity_index.insert(
            id,
            EntityLocation { file_path: entry.file_path, byte_offset: entry.byte_offset, byte_length: entry.byte_length },
        );
    }
    let files = m
        .files
        .into_iter()
        .map(|f| ManifestFile {
            path: f.path,
            footer_offset: f.footer_offset,
            footer_size: f.footer_size,
            entity_count: f.entity_count,
            version: f.version,
            updated_at: f.updated_at,
        })
        .collect();
    Ok(NamespaceManifest { namespace: m.namespace, version: m.version, files, entity_index, created_at: m.created_at })
}

pub fn export_to_r2(m: &NamespaceManifest) -> R2Manifest {
    let mut entity_index: Vec<R2EntityIndexEntry> = m
        .entity_index
        .iter()
        .map(|(id, loc)| R2EntityIndexEntry {
            entity_id: id.as_str().to_string(),
            file_path: loc.file_path.clone(),
            byte_offset: loc.byte_offset,
            byte_length: loc.byte_length,
        })
        .collect();
    // Deterministic ordering so two exports of the same logical state
    // produce byte-identical JSON (useful for sync idempotency tests).
    entity_index.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    let files = m
        .files
        .iter()
        .map(|f| R2ManifestFile {
            path: f.path.clone(),
            footer_offset: f.footer_offset,
            footer_size: f.footer_size,
            entity_count: f.entity_count,
            version: f.version.clone(),
            updated_at: f.updated_at,
        })
        .collect();
    R2Manifest { namespace: m.namespace.clone(), version: m.version.clone(), files, entity_index, created_at: m.created_at }
}

/// Serializes a [`NamespaceManifest`] to the bytes stored both remotely
/// (R2) and locally (the DO-like cache) — the two sides share one wire
/// shape, per spec §4.5's framing of local storage as a cache of the
/// same logical document.
pub fn serialize(m: &NamespaceManifest) -> Vec<u8> {
    serde_json::to_vec(&export_to_r2(m)).expect("R2Manifest always serializes")
}

pub fn deserialize(bytes: &[u8]) -> ManifestResult<NamespaceManifest> {
    let r2: R2Manifest = serde_json::from_slice(bytes).map_err(|e| ManifestError::MalformedLocal(e.to_string()))?;
    import_from_r2(r2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut m = NamespaceManifest::empty("https://ex.com", 1000);
        m.version = "1.0.0".to_string();
        m.entity_index.insert(
            EntityId::parse("https://ex.com/e1").unwrap(),
            EntityLocation { file_path: "chunk-1.gcol".to_string(), byte_offset: 0, byte_length: 100 },
        );
        let bytes = serialize(&m);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(restored.version, "1.0.0");
        assert_eq!(restored.entity_index.len(), 1);
    }

    #[test]
    fn rejects_malformed_entity_id() {
        let r2 = R2Manifest {
            namespace: "https://ex.com".to_string(),
            version: "1.0.0".to_string(),
            files: Vec::new(),
            entity_index: vec![R2EntityIndexEntry {
                entity_id: "not-a-url".to_string(),
                file_path: "chunk-1.gcol".to_string(),
                byte_offset: 0,
                byte_length: 1,
            }],
            created_at: 0,
        };
        assert!(import_from_r2(r2).is_err());
    }
}
