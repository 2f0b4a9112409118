//! Plan execution engine (spec component C9): routes a compiled
//! `QueryPlan` across shards, consulting bloom filters before each storage
//! read and bounding fan-out per spec §4.9/§5.

mod error;
mod executor;
mod router;
mod value;

pub use error::{ExecError, ExecResult};
pub use executor::{Executor, ExecConfig, DEFAULT_MAX_CONCURRENT_SHARD_REQUESTS, DEFAULT_MAX_REFS_PER_SOURCE};
pub use router::{Router, ShardHandle};
pub use value::{matches_condition, ExecValue};
