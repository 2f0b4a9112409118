//! Builds the running process's object graph from a [`Config`]: one
//! [`FsBlobStore`] shared by every shard and the manifest store, one
//! [`Shard`] per configured shard id registered into an
//! [`edgegraph_exec::Router`], a [`ManifestStore`] acting as the shards'
//! [`ManifestSink`], a single [`TripleIndexer`] every shard notifies as an
//! [`IndexSink`] and that [`RpcContext`] queries back out of, and the
//! [`Planner`]/[`Executor`] pair `RpcContext` dispatches through.

use std::sync::Arc;

use edgegraph_exec::{ExecConfig, Executor, Router};
use edgegraph_index::TripleIndexer;
use edgegraph_manifest::{InMemoryLocalManifestStorage, ManifestStore, ManifestStoreConfig};
use edgegraph_planner::Planner;
use edgegraph_rpc::RpcContext;
use edgegraph_store::{IndexSink, Shard, WriterConfig};

use crate::blob_fs::FsBlobStore;
use crate::config::Config;

/// Owns the pieces that `main` needs to keep alive for the lifetime of the
/// process (transport handlers only ever touch `rpc`).
pub struct App {
    pub rpc: Arc<RpcContext>,
}

pub fn build(config: &Config) -> App {
    let blob: Arc<dyn edgegraph_store::BlobStore> = Arc::new(FsBlobStore::new(&config.blob_dir));

    let manifest_store = Arc::new(ManifestStore::new(
        ManifestStoreConfig {
            max_cached_namespaces: config.manifest_max_cached_namespaces,
            max_entities_per_namespace: config.manifest_max_entities_per_namespace,
        },
        blob.clone(),
        Arc::new(InMemoryLocalManifestStorage::new()),
    ));
    let sink: Arc<dyn edgegraph_store::ManifestSink> = manifest_store;
    let index = Arc::new(TripleIndexer::new(blob.clone()));
    let index_sink: Arc<dyn IndexSink> = index.clone();

    let writer_config = WriterConfig {
        namespace: config.namespace.clone(),
        max_buffered_triples: config.writer_max_buffered_triples,
        max_pending_batches: config.writer_max_pending_batches,
        ..WriterConfig::new(&config.namespace)
    };

    let mut router = Router::new(&config.namespace);
    for shard_id in 0..config.num_shards {
        let shard = Arc::new(
            Shard::new(writer_config.clone(), blob.clone(), sink.clone()).with_index_sink(index_sink.clone()),
        );
        router.insert_shard_with_bloom_params(shard_id, shard, config.bloom_capacity, config.bloom_false_positive_rate);
    }

    let executor = Executor::new(
        router,
        ExecConfig {
            max_concurrent_shard_requests: config.exec_max_concurrent_shard_requests,
            max_refs_per_source: config.exec_max_refs_per_source,
        },
    );
    let planner = Planner::new(&config.namespace, config.planner_cache_capacity);

    App { rpc: Arc::new(RpcContext::new(executor, planner, index)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_a_context_that_round_trips_an_entity() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config { blob_dir: dir.path().display().to_string(), num_shards: 4, ..Config::default() };
        let app = build(&config);

        let id = format!("{}/user/1", config.namespace);
        let created = app
            .rpc
            .dispatch("createEntity", serde_json::json!({ "entity": { "id": id, "properties": { "name": "Ada" } } }))
            .await
            .unwrap();
        assert_eq!(created["properties"]["name"], "Ada");
    }

    #[tokio::test]
    async fn a_created_entity_is_fts_searchable_through_the_wired_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config { blob_dir: dir.path().display().to_string(), num_shards: 4, ..Config::default() };
        let app = build(&config);

        let id = format!("{}/user/1", config.namespace);
        app.rpc
            .dispatch("createEntity", serde_json::json!({ "entity": { "id": id.clone(), "properties": { "bio": "graph database engineer" } } }))
            .await
            .unwrap();

        let hits = app.rpc.dispatch("ftsSearch", serde_json::json!({ "query": "graph", "predicate": "bio" })).await.unwrap();
        assert_eq!(hits, serde_json::json!([id]));
    }
}
