//! Collaborator a shard notifies as triples are written or superseded, so
//! `STRING`/`VECTOR`/`GEO_POINT` predicates stay queryable through the
//! full-text, vector, and geo indexes (spec §4.6: indexes are "built from
//! the row table"). Kept as a trait here, mirroring [`crate::ManifestSink`],
//! so `edgegraph-store` carries no dependency on `edgegraph-index` (which
//! itself depends on this crate for `BlobStore`).

use async_trait::async_trait;

use edgegraph_types::Triple;

use crate::error::StoreResult;

#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Indexes `triple`'s current value. Implementations ignore value
    /// kinds they don't cover (everything but `STRING`/`VECTOR`/
    /// `GEO_POINT`).
    async fn index_triple(&self, triple: &Triple) -> StoreResult<()>;

    /// Removes the entry `triple` previously added via `index_triple`,
    /// called with the value being superseded by an update or tombstoned
    /// by a delete.
    async fn remove_triple(&self, triple: &Triple) -> StoreResult<()>;
}
