//! Shared observability plumbing: `tracing` subscriber setup and the
//! process-wide `prometheus` registry, mirroring `near-o11y`'s role in the
//! teacher codebase.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use tracing_subscriber::EnvFilter;

/// Process-wide metric registry. Every crate registers its collectors here
/// instead of using the global default registry, so the server binary can
/// expose one `/metrics` page for the whole workspace.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Installs a `tracing-subscriber` formatter driven by `RUST_LOG`,
/// defaulting to `info` when unset. Safe to call more than once; only the
/// first call wins.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

/// Counter/histogram bundle for shard-store operations.
pub struct StoreMetrics {
    pub ops_total: IntCounterVec,
    pub op_latency_seconds: Histogram,
    pub chunk_uploads_total: IntCounter,
    pub chunk_upload_failures_total: IntCounter,
}

impl StoreMetrics {
    pub fn new() -> Self {
        let ops_total = IntCounterVec::new(
            Opts::new("edgegraph_store_ops_total", "Shard store operations by kind"),
            &["op"],
        )
        .expect("metric");
        let op_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "edgegraph_store_op_latency_seconds",
            "Shard store operation latency",
        ))
        .expect("metric");
        let chunk_uploads_total = IntCounter::new(
            "edgegraph_chunk_uploads_total",
            "Successful chunk uploads emitted by the batched writer",
        )
        .expect("metric");
        let chunk_upload_failures_total = IntCounter::new(
            "edgegraph_chunk_upload_failures_total",
            "Chunk upload attempts that exhausted retries",
        )
        .expect("metric");
        let _ = REGISTRY.register(Box::new(ops_total.clone()));
        let _ = REGISTRY.register(Box::new(op_latency_seconds.clone()));
        let _ = REGISTRY.register(Box::new(chunk_uploads_total.clone()));
        let _ = REGISTRY.register(Box::new(chunk_upload_failures_total.clone()));
        Self { ops_total, op_latency_seconds, chunk_uploads_total, chunk_upload_failures_total }
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Bloom-filter hit/miss counters, consulted by the executor to decide
/// whether a routing decision skipped a storage read.
pub struct BloomMetrics {
    pub checks_total: IntCounterVec,
}

impl BloomMetrics {
    pub fn new() -> Self {
        let checks_total = IntCounterVec::new(
            Opts::new("edgegraph_bloom_checks_total", "Bloom filter membership checks"),
            &["result"],
        )
        .expect("metric");
        let _ = REGISTRY.register(Box::new(checks_total.clone()));
        Self { checks_total }
    }
}

impl Default for BloomMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Planner cache hit/miss counters.
pub struct PlannerMetrics {
    pub cache_total: IntCounterVec,
}

impl PlannerMetrics {
    pub fn new() -> Self {
        let cache_total = IntCounterVec::new(
            Opts::new("edgegraph_planner_cache_total", "Plan cache lookups"),
            &["result"],
        )
        .expect("metric");
        let _ = REGISTRY.register(Box::new(cache_total.clone()));
        Self { cache_total }
    }
}

impl Default for PlannerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
