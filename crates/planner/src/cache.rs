//! LRU-cached planner (spec §4.8): "Cached planner. LRU over `cacheKey`,
//! capped by size; `invalidateCache()` wipes it."

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use edgegraph_query::Query;

use crate::error::PlanResult;
use crate::plan::{compile, QueryPlan};

pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 1024;

/// Wraps [`compile`] with an LRU cache keyed on `QueryPlan::cache_key`, so
/// planning the same query shape twice skips recompilation. Guarded by a
/// single `parking_lot::Mutex` per spec §5's shared-resource policy: the
/// plan cache is shared-mutable and must be protected around writes.
pub struct Planner {
    namespace: String,
    cache: Mutex<LruCache<String, QueryPlan>>,
}

impl Planner {
    pub fn new(namespace: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_PLAN_CACHE_CAPACITY).unwrap());
        Self { namespace: namespace.into(), cache: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn plan(&self, query: &Query) -> PlanResult<QueryPlan> {
        let probe_key = crate::plan::cache_key_for(query);
        if let Some(cached) = self.cache.lock().get(&probe_key).cloned() {
            return Ok(cached);
        }
        let plan = compile(query, &self.namespace)?;
        if plan.can_cache {
            self.cache.lock().put(plan.cache_key.clone(), plan.clone());
        }
        Ok(plan)
    }

    pub fn invalidate_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}
