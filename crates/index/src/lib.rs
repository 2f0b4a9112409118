//! Index layer (spec component C6): the full-text prefix index, the HNSW
//! approximate-nearest-neighbor vector index, and the point-geo index,
//! all built from the row table's indexable columns.

mod error;
mod fts;
mod geo;
mod sink;
mod vector;

pub use error::{FtsErrorCode, FtsQueryError, FtsResult, IndexError, IndexResult};
pub use fts::{FtsIndex, FtsManager};
pub use geo::GeoIndex;
pub use sink::TripleIndexer;
pub use vector::{CosineDistance, HnswIndex, HnswParams, HnswStats, L2Distance, VectorDistance};
