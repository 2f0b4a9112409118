//! HNSW vector index (spec §4.6): the graph structure lives in memory
//! (mirroring the structured per-shard store in the real deployment); the
//! vectors themselves live in the blob-store collaborator at
//! `vectors/{predicate}/{nodeId}`, read through an in-memory cache here so
//! repeated distance computations during a single search don't each incur
//! a blob round trip.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use edgegraph_store::{vector_key, BlobStore};
use edgegraph_types::EntityId;

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub m0: usize,
    pub ef_construction: usize,
    pub m_l: f64,
}

impl HnswParams {
    pub fn with_m(m: usize) -> Self {
        Self { m, m0: m * 2, ef_construction: 200, m_l: 1.0 / (m as f64).ln() }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::with_m(16)
    }
}

/// Pluggable distance metric, per spec §4.6 ("cosine and L2 are
/// predefined"). Lower is closer.
pub trait VectorDistance: Send + Sync {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

pub struct CosineDistance;

impl VectorDistance for CosineDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }
}

pub struct L2Distance;

impl VectorDistance for L2Distance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }
}

struct NodeMeta {
    /// `neighbors[layer]` is the adjacency list at that layer; layer 0 is
    /// always present, higher layers only up to this node's sampled level.
    neighbors: Vec<Vec<EntityId>>,
    deleted: bool,
}

#[derive(Default)]
struct Graph {
    nodes: HashMap<EntityId, NodeMeta>,
    entry_point: Option<EntityId>,
    max_layer: usize,
}

#[derive(Debug, Clone)]
pub struct HnswStats {
    pub node_count: usize,
    pub deleted_count: usize,
    pub max_layer: usize,
    pub entry_point: Option<EntityId>,
}

/// One predicate's HNSW index.
pub struct HnswIndex {
    predicate: String,
    params: HnswParams,
    distance: Arc<dyn VectorDistance>,
    blob: Arc<dyn BlobStore>,
    graph: RwLock<Graph>,
    vectors: RwLock<HashMap<EntityId, Vec<f32>>>,
}

impl HnswIndex {
    pub fn new(predicate: impl Into<String>, params: HnswParams, distance: Arc<dyn VectorDistance>, blob: Arc<dyn BlobStore>) -> Self {
        Self { predicate: predicate.into(), params, distance, blob, graph: RwLock::new(Graph::default()), vectors: RwLock::new(HashMap::new()) }
    }

    pub fn stats(&self) -> HnswStats {
        let graph = self.graph.read();
        let deleted = graph.nodes.values().filter(|n| n.deleted).count();
        HnswStats { node_count: graph.nodes.len(), deleted_count: deleted, max_layer: graph.max_layer, entry_point: graph.entry_point.clone() }
    }

    async fn store_vector(&self, node_id: &EntityId, vector: &[f32]) -> IndexResult<()> {
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.blob.put(&vector_key(&self.predicate, node_id.as_str()), bytes, Some("application/octet-stream")).await.map_err(IndexError::from)?;
        self.vectors.write().insert(node_id.clone(), vector.to_vec());
        Ok(())
    }

    async fn fetch_vector(&self, node_id: &EntityId) -> IndexResult<Vec<f32>> {
        if let Some(v) = self.vectors.read().get(node_id) {
            return Ok(v.clone());
        }
        let bytes = self.blob.get(&vector_key(&self.predicate, node_id.as_str())).await.map_err(IndexError::from)?;
        let vector: Vec<f32> = bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
        self.vectors.write().insert(node_id.clone(), vector.clone());
        Ok(vector)
    }

    fn sample_level(&self) -> usize {
        let uniform: f64 = rand::thread_rng().gen_range(f64::EPSILON..1.0);
        (-uniform.ln() * self.params.m_l).floor() as usize
    }

    /// Inserts `node_id` with `vector`, wiring it into the graph per the
    /// standard HNSW insertion algorithm (spec §4.6): greedy descent from
    /// the entry point down to `level + 1`, then beam search + neighbor
    /// selection at each layer from `level` down to `0`.
    pub async fn insert(&self, node_id: EntityId, vector: Vec<f32>) -> IndexResult<()> {
        self.store_vector(&node_id, &vector).await?;
        let level = self.sample_level();

        let (entry_point, max_layer) = {
            let graph = self.graph.read();
            (graph.entry_point.clone(), graph.max_layer)
        };

        let Some(mut current) = entry_point else {
            let mut graph = self.graph.write();
            graph.nodes.insert(node_id.clone(), NodeMeta { neighbors: vec![Vec::new(); level + 1], deleted: false });
            graph.entry_point = Some(node_id);
            graph.max_layer = level;
            return Ok(());
        };

        // Greedy descent down to level+1: at each layer, walk to the
        // locally nearest neighbor until no improvement, then drop a
        // layer.
        for layer in ((level + 1)..=max_layer).rev() {
            current = self.greedy_nearest(&current, &vector, layer).await?;
        }

        {
            let mut graph = self.graph.write();
            graph.nodes.insert(node_id.clone(), NodeMeta { neighbors: vec![Vec::new(); level + 1], deleted: false });
        }

        for layer in (0..=level.min(max_layer)).rev() {
            let candidates = self.search_layer(&current, &vector, layer, self.params.ef_construction).await?;
            let max_conn = if layer == 0 { self.params.m0 } else { self.params.m };
            let selected = self.select_neighbors(candidates.clone(), max_conn);

            {
                let mut graph = self.graph.write();
                if let Some(meta) = graph.nodes.get_mut(&node_id) {
                    meta.neighbors[layer] = selected.iter().map(|(id, _)| id.clone()).collect();
                }
            }
            for (neighbor_id, _) in &selected {
                self.connect_and_shrink(neighbor_id, &node_id, layer, max_conn).await?;
            }
            if let Some((nearest, _)) = candidates.into_iter().next() {
                current = nearest;
            }
        }

        if level > max_layer {
            let mut graph = self.graph.write();
            graph.entry_point = Some(node_id);
            graph.max_layer = level;
        }
        Ok(())
    }

    async fn connect_and_shrink(&self, node_id: &EntityId, new_neighbor: &EntityId, layer: usize, max_conn: usize) -> IndexResult<()> {
        let needs_shrink = {
            let mut graph = self.graph.write();
            let Some(meta) = graph.nodes.get_mut(node_id) else { return Ok(()) };
            if layer >= meta.neighbors.len() {
                meta.neighbors.resize(layer + 1, Vec::new());
            }
            if !meta.neighbors[layer].contains(new_neighbor) {
                meta.neighbors[layer].push(new_neighbor.clone());
            }
            meta.neighbors[layer].len() > max_conn
        };
        if needs_shrink {
            self.shrink_connections(node_id, layer, max_conn).await?;
        }
        Ok(())
    }

    /// Re-selects `node_id`'s `max_conn` best neighbors at `layer` by
    /// distance, dropping the rest ("shrink over-connected nodes to their
    /// `M` best", spec §4.6).
    async fn shrink_connections(&self, node_id: &EntityId, layer: usize, max_conn: usize) -> IndexResult<()> {
        let current_neighbors = {
            let graph = self.graph.read();
            graph.nodes.get(node_id).map(|m| m.neighbors[layer].clone()).unwrap_or_default()
        };
        let vector = self.fetch_vector(node_id).await?;
        let mut scored = Vec::with_capacity(current_neighbors.len());
        for neighbor in current_neighbors {
            let nv = self.fetch_vector(&neighbor).await?;
            scored.push((neighbor, self.distance.distance(&vector, &nv)));
        }
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(max_conn);
        let mut graph = self.graph.write();
        if let Some(meta) = graph.nodes.get_mut(node_id) {
            meta.neighbors[layer] = scored.into_iter().map(|(id, _)| id).collect();
        }
        Ok(())
    }

    /// Walks to the locally-nearest-to-`query` node reachable from
    /// `start` at `layer`, one hop at a time (ef=1 greedy search used
    /// during the upper-layer descent).
    async fn greedy_nearest(&self, start: &EntityId, query: &[f32], layer: usize) -> IndexResult<EntityId> {
        let mut current = start.clone();
        let mut current_dist = self.distance.distance(query, &self.fetch_vector(&current).await?);
        loop {
            let neighbors = {
                let graph = self.graph.read();
                graph.nodes.get(&current).and_then(|m| m.neighbors.get(layer)).cloned().unwrap_or_default()
            };
            let mut improved = false;
            for neighbor in neighbors {
                let nv = self.fetch_vector(&neighbor).await?;
                let d = self.distance.distance(query, &nv);
                if d < current_dist {
                    current = neighbor;
                    current_dist = d;
                    improved = true;
                }
            }
            if !improved {
                return Ok(current);
            }
        }
    }

    /// Beam search at one layer: maintains a candidate frontier of size
    /// `ef`, expanding through neighbors until no closer candidate is
    /// found. Returns candidates sorted nearest-first, live nodes only.
    async fn search_layer(&self, start: &EntityId, query: &[f32], layer: usize, ef: usize) -> IndexResult<Vec<(EntityId, f32)>> {
        let mut visited = std::collections::HashSet::new();
        visited.insert(start.clone());
        let start_dist = self.distance.distance(query, &self.fetch_vector(start).await?);
        let mut candidates = vec![(start.clone(), start_dist)];
        let mut result = candidates.clone();

        while let Some((current, current_dist)) = candidates.pop() {
            if let Some((_, worst)) = result.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
                if result.len() >= ef && current_dist > *worst {
                    break;
                }
            }
            let neighbors = {
                let graph = self.graph.read();
                graph.nodes.get(&current).and_then(|m| m.neighbors.get(layer)).cloned().unwrap_or_default()
            };
            for neighbor in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let is_deleted = self.graph.read().nodes.get(&neighbor).map(|m| m.deleted).unwrap_or(true);
                let nv = self.fetch_vector(&neighbor).await?;
                let d = self.distance.distance(query, &nv);
                candidates.push((neighbor.clone(), d));
                candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
                if !is_deleted {
                    result.push((neighbor, d));
                }
                if result.len() > ef {
                    result.sort_by(|a, b| a.1.total_cmp(&b.1));
                    result.truncate(ef);
                }
            }
        }
        result.sort_by(|a, b| a.1.total_cmp(&b.1));
        result.retain(|(id, _)| !self.graph.read().nodes.get(id).map(|m| m.deleted).unwrap_or(true));
        Ok(result)
    }

    fn select_neighbors(&self, mut candidates: Vec<(EntityId, f32)>, max_conn: usize) -> Vec<(EntityId, f32)> {
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(max_conn);
        candidates
    }

    /// Approximate k-nearest-neighbor search (spec §4.6). `ef` defaults to
    /// `max(k, ef_construction)` if not given, so a caller asking for more
    /// results than the construction-time beam width still gets a
    /// reasonably wide search.
    pub async fn search(&self, query: &[f32], k: usize, ef: Option<usize>) -> IndexResult<Vec<(EntityId, f32)>> {
        let (entry_point, max_layer) = {
            let graph = self.graph.read();
            (graph.entry_point.clone(), graph.max_layer)
        };
        let Some(mut current) = entry_point else { return Ok(Vec::new()) };
        for layer in (1..=max_layer).rev() {
            current = self.greedy_nearest(&current, query, layer).await?;
        }
        let ef = ef.unwrap_or_else(|| k.max(self.params.ef_construction));
        let mut results = self.search_layer(&current, query, 0, ef).await?;
        results.truncate(k);
        Ok(results)
    }

    /// Tombstones `node_id`: back-edges are left in place and filtered at
    /// search time (spec §4.6's documented acceptable strategy), avoiding
    /// an expensive full back-edge scan on every delete.
    pub fn delete(&self, node_id: &EntityId) {
        let mut graph = self.graph.write();
        if let Some(meta) = graph.nodes.get_mut(node_id) {
            meta.deleted = true;
        }
    }
}
