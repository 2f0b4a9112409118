//! Typed server configuration (SPEC_FULL.md §1 "Configuration"): a
//! `serde`-deserialized struct loaded from TOML, validated with
//! descriptive errors before anything binds a socket, mirroring the
//! teacher's `Config`/`validate_config` split in `nearcore::config`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_home() -> String {
    "https://edgegraph.local".to_string()
}
fn default_num_shards() -> u32 {
    edgegraph_planner::NUM_SHARDS
}
fn default_bloom_capacity() -> usize {
    edgegraph_bloom::DEFAULT_CAPACITY
}
fn default_bloom_fpr() -> f64 {
    edgegraph_bloom::DEFAULT_FPR
}
fn default_max_buffered_triples() -> usize {
    edgegraph_store::DEFAULT_MAX_BUFFERED_TRIPLES
}
fn default_max_pending_batches() -> usize {
    edgegraph_store::DEFAULT_MAX_PENDING_BATCHES
}
fn default_max_cached_namespaces() -> usize {
    edgegraph_manifest::DEFAULT_MAX_CACHED_NAMESPACES
}
fn default_max_entities_per_namespace() -> usize {
    edgegraph_manifest::DEFAULT_MAX_ENTITIES_PER_NAMESPACE
}
fn default_plan_cache_capacity() -> usize {
    1024
}
fn default_max_concurrent_shard_requests() -> usize {
    edgegraph_exec::DEFAULT_MAX_CONCURRENT_SHARD_REQUESTS
}
fn default_max_refs_per_source() -> usize {
    edgegraph_exec::DEFAULT_MAX_REFS_PER_SOURCE
}
fn default_http_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_ws_addr() -> String {
    "127.0.0.1:8081".to_string()
}
fn default_blob_dir() -> String {
    "./data/blobs".to_string()
}

/// Bounds applied to every inbound request before a method handler ever
/// sees it (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcLimitsConfig {
    pub max_size: usize,
    pub max_depth: usize,
    pub max_keys: usize,
    pub request_timeout_ms: u64,
}

impl Default for RpcLimitsConfig {
    fn default() -> Self {
        Self {
            max_size: edgegraph_rpc::DEFAULT_MAX_SIZE,
            max_depth: edgegraph_rpc::DEFAULT_MAX_DEPTH,
            max_keys: edgegraph_rpc::DEFAULT_MAX_KEYS,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The namespace this process serves, used to key shard routing and
    /// blob/manifest paths (spec glossary: "namespace").
    #[serde(default = "default_home")]
    pub namespace: String,
    #[serde(default = "default_num_shards")]
    pub num_shards: u32,
    #[serde(default = "default_bloom_capacity")]
    pub bloom_capacity: usize,
    #[serde(default = "default_bloom_fpr")]
    pub bloom_false_positive_rate: f64,
    #[serde(default = "default_max_buffered_triples")]
    pub writer_max_buffered_triples: usize,
    #[serde(default = "default_max_pending_batches")]
    pub writer_max_pending_batches: usize,
    #[serde(default = "default_max_cached_namespaces")]
    pub manifest_max_cached_namespaces: usize,
    #[serde(default = "default_max_entities_per_namespace")]
    pub manifest_max_entities_per_namespace: usize,
    #[serde(default = "default_plan_cache_capacity")]
    pub planner_cache_capacity: usize,
    #[serde(default = "default_max_concurrent_shard_requests")]
    pub exec_max_concurrent_shard_requests: usize,
    #[serde(default = "default_max_refs_per_source")]
    pub exec_max_refs_per_source: usize,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_ws_addr")]
    pub ws_addr: String,
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
    #[serde(default)]
    pub rpc_limits: RpcLimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_home(),
            num_shards: default_num_shards(),
            bloom_capacity: default_bloom_capacity(),
            bloom_false_positive_rate: default_bloom_fpr(),
            writer_max_buffered_triples: default_max_buffered_triples(),
            writer_max_pending_batches: default_max_pending_batches(),
            manifest_max_cached_namespaces: default_max_cached_namespaces(),
            manifest_max_entities_per_namespace: default_max_entities_per_namespace(),
            planner_cache_capacity: default_plan_cache_capacity(),
            exec_max_concurrent_shard_requests: default_max_concurrent_shard_requests(),
            exec_max_refs_per_source: default_max_refs_per_source(),
            http_addr: default_http_addr(),
            ws_addr: default_ws_addr(),
            blob_dir: default_blob_dir(),
            rpc_limits: RpcLimitsConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("config file {path} is not valid TOML: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("config failed validation:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

impl Config {
    /// Loads and validates a config file, the way `nearcore::config` loads
    /// and then runs `validate_config` over `config.json` before the node
    /// starts.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let config: Config =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Accumulates every violation instead of failing on the first one, so
    /// an operator sees the whole list of problems in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.num_shards == 0 {
            errors.push("num_shards must be greater than zero".to_string());
        }
        if self.bloom_capacity == 0 {
            errors.push("bloom_capacity must be greater than zero".to_string());
        }
        if !(0.0..1.0).contains(&self.bloom_false_positive_rate) {
            errors.push(format!(
                "bloom_false_positive_rate must be in (0.0, 1.0), got {}",
                self.bloom_false_positive_rate
            ));
        }
        if self.writer_max_buffered_triples == 0 {
            errors.push("writer_max_buffered_triples must be greater than zero".to_string());
        }
        if self.writer_max_pending_batches == 0 {
            errors.push("writer_max_pending_batches must be greater than zero".to_string());
        }
        if self.manifest_max_cached_namespaces == 0 {
            errors.push("manifest_max_cached_namespaces must be greater than zero".to_string());
        }
        if self.planner_cache_capacity == 0 {
            errors.push("planner_cache_capacity must be greater than zero".to_string());
        }
        if self.exec_max_concurrent_shard_requests == 0 {
            errors.push("exec_max_concurrent_shard_requests must be greater than zero".to_string());
        }
        if self.exec_max_refs_per_source == 0 {
            errors.push("exec_max_refs_per_source must be greater than zero".to_string());
        }
        if self.rpc_limits.max_size == 0 {
            errors.push("rpc_limits.max_size must be greater than zero".to_string());
        }
        if self.rpc_limits.max_depth == 0 {
            errors.push("rpc_limits.max_depth must be greater than zero".to_string());
        }
        if self.http_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("http_addr {:?} is not a valid socket address", self.http_addr));
        }
        if self.ws_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("ws_addr {:?} is not a valid socket address", self.ws_addr));
        }
        if self.http_addr == self.ws_addr {
            errors.push("http_addr and ws_addr must not be the same socket address".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_shard_count_is_rejected() {
        let config = Config { num_shards: 0, ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn identical_http_and_ws_addr_is_rejected() {
        let config = Config { ws_addr: default_http_addr(), ..Config::default() };
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(messages) => assert!(messages.iter().any(|m| m.contains("must not be the same"))),
            _ => panic!("expected Invalid"),
        }
    }

    #[test]
    fn malformed_bloom_fpr_is_rejected() {
        let config = Config { bloom_false_positive_rate: 1.5, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_toml_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "namespace = \"https://ex.com\"\nnum_shards = 8\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.namespace, "https://ex.com");
        assert_eq!(config.num_shards, 8);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
