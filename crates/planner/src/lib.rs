//! Planner (spec component C8): compiles a parsed query into an ordered,
//! costed [`QueryPlan`], assigns shards deterministically, and caches
//! plans by a structural cache key.

mod cache;
mod error;
mod plan;
mod shard;

pub use cache::{Planner, DEFAULT_PLAN_CACHE_CAPACITY};
pub use error::{PlanError, PlanResult};
pub use plan::{compile, PlanStep, QueryPlan, MAX_RECURSION_DEPTH};
pub use shard::{shard_for, NUM_SHARDS};
