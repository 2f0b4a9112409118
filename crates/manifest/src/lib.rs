//! The manifest store (spec component C5): the mapping a reader needs to
//! turn a query into a minimal set of byte-range blob fetches, plus the
//! R2<->local sync protocol that keeps the local cache current with the
//! blob store's source of truth.

mod error;
mod local;
mod model;
mod store;

pub use error::{ManifestError, ManifestResult, SyncErrorCode};
pub use local::{InMemoryLocalManifestStorage, LocalManifestStorage};
pub use model::{
    export_to_r2, import_from_r2, EntityLocation, ManifestFile, NamespaceManifest, R2EntityIndexEntry, R2Manifest,
    R2ManifestFile,
};
pub use store::{
    ManifestStore, ManifestStoreConfig, SyncDirection, SyncResult, SyncStatus, DEFAULT_MAX_CACHED_NAMESPACES,
    DEFAULT_MAX_ENTITIES_PER_NAMESPACE,
};
