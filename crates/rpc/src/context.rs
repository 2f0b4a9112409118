//! Wires the typed method table to the execution engine and storage
//! layer: one `RpcContext` per server process, shared across connections.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use edgegraph_exec::Executor;
use edgegraph_index::TripleIndexer;
use edgegraph_planner::Planner;
use edgegraph_query as query;
use edgegraph_types::{EntityId, Predicate, Triple, TxIdGenerator};

use crate::error::{RpcError, RpcErrorCode};
use crate::methods::{
    typed_value_to_json, BatchExecuteArgs, BatchGetArgs, BatchOperation, BatchResult, CreateEntityArgs, DeleteEntityArgs,
    EntityInput, EntityView, FtsSearchArgs, GeoSearchArgs, GetEntityArgs, PathTraverseArgs, QueryArgs, ReverseTraverseArgs,
    RpcMethod, TraverseArgs, UpdateEntityArgs, VectorSearchArgs,
};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is before the epoch").as_millis() as u64
}

pub struct RpcContext {
    executor: Executor,
    planner: Planner,
    tx_gen: TxIdGenerator,
    index: Arc<TripleIndexer>,
}

impl RpcContext {
    pub fn new(executor: Executor, planner: Planner, index: Arc<TripleIndexer>) -> Self {
        Self { executor, planner, tx_gen: TxIdGenerator::new(), index }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The typed-method-table entry point: parses `method`, deserializes
    /// `args` into that method's argument struct, and dispatches.
    pub async fn dispatch(&self, method: &str, args: Value) -> Result<Value, RpcError> {
        let method = RpcMethod::parse(method).ok_or_else(|| RpcError::unknown_method(method))?;
        match method {
            RpcMethod::GetEntity => self.get_entity(parse_args(args)?).await,
            RpcMethod::CreateEntity => self.create_entity(parse_args(args)?).await,
            RpcMethod::UpdateEntity => self.update_entity(parse_args(args)?).await,
            RpcMethod::DeleteEntity => self.delete_entity(parse_args(args)?).await,
            RpcMethod::Traverse => self.traverse(parse_args(args)?).await,
            RpcMethod::ReverseTraverse => self.reverse_traverse(parse_args(args)?).await,
            RpcMethod::PathTraverse => self.path_traverse(parse_args(args)?).await,
            RpcMethod::Query => self.query(parse_args(args)?).await,
            RpcMethod::BatchGet => self.batch_get(parse_args(args)?).await,
            RpcMethod::BatchCreate => self.batch_create(parse_args(args)?).await,
            RpcMethod::BatchExecute => self.batch_execute(parse_args(args)?).await,
            RpcMethod::FtsSearch => self.fts_search(parse_args(args)?).await,
            RpcMethod::VectorSearch => self.vector_search(parse_args(args)?).await,
            RpcMethod::GeoSearch => self.geo_search(parse_args(args)?).await,
        }
    }

    async fn get_entity(&self, args: GetEntityArgs) -> Result<Value, RpcError> {
        let id = EntityId::parse(args.id)?;
        let triples = self.executor.lookup(&id).await?.ok_or_else(|| RpcError::not_found("entity not found"))?;
        Ok(serde_json::to_value(entity_view(&id, &triples))?)
    }

    async fn create_entity(&self, args: CreateEntityArgs) -> Result<Value, RpcError> {
        let view = self.put_entity(args.entity).await?;
        Ok(serde_json::to_value(view)?)
    }

    async fn put_entity(&self, entity: EntityInput) -> Result<EntityView, RpcError> {
        let id = EntityId::parse(entity.id)?;
        let handle = self.executor.router().handle_for(&id)?;
        let timestamp = now_ms();
        for (key, value) in &entity.properties {
            let predicate = Predicate::parse(key.clone())?;
            let object = crate::methods::json_to_typed_value(value)?;
            let triple = Triple { subject: id.clone(), predicate, object, timestamp, tx_id: self.tx_gen.next(timestamp) };
            handle.shard().insert(triple).await?;
        }
        handle.register(&id);
        let triples = handle.shard().get_subject(&id);
        Ok(entity_view(&id, &triples))
    }

    async fn update_entity(&self, args: UpdateEntityArgs) -> Result<Value, RpcError> {
        let id = EntityId::parse(args.id)?;
        let handle = self.executor.router().handle_for(&id)?;
        let timestamp = now_ms();
        for (key, value) in &args.props {
            let predicate = Predicate::parse(key.clone())?;
            let object = crate::methods::json_to_typed_value(value)?;
            handle.shard().update(id.clone(), predicate, object, self.tx_gen.next(timestamp), timestamp).await?;
        }
        handle.register(&id);
        let triples = handle.shard().get_subject(&id);
        Ok(serde_json::to_value(entity_view(&id, &triples))?)
    }

    async fn delete_entity(&self, args: DeleteEntityArgs) -> Result<Value, RpcError> {
        let id = EntityId::parse(args.id)?;
        let handle = self.executor.router().handle_for(&id)?;
        let timestamp = now_ms();
        handle.shard().delete_entity(&id, self.tx_gen.next(timestamp), timestamp).await?;
        Ok(serde_json::json!({ "deleted": true }))
    }

    async fn traverse(&self, args: TraverseArgs) -> Result<Value, RpcError> {
        let start = EntityId::parse(args.start_id)?;
        let triples = self.executor.lookup(&start).await?.ok_or_else(|| RpcError::not_found("start entity not found"))?;
        let mut refs = self.executor.refs_for_predicate(&[(start, triples)], &args.predicate);
        if let Some(max_refs) = args.options.max_refs {
            refs.truncate(max_refs);
        }
        let frontier = self.executor.fetch_multi(&refs).await?;
        Ok(Value::Array(frontier.iter().map(|(id, triples)| serde_json::to_value(entity_view(id, triples)).unwrap_or(Value::Null)).collect()))
    }

    async fn reverse_traverse(&self, args: ReverseTraverseArgs) -> Result<Value, RpcError> {
        let target = EntityId::parse(args.target_id)?;
        let triples = self.executor.lookup(&target).await?.ok_or_else(|| RpcError::not_found("target entity not found"))?;
        let mut frontier = self.executor.reverse_traverse(&[(target, triples)], &args.predicate).await?;
        if let Some(max_refs) = args.options.max_refs {
            frontier.truncate(max_refs);
        }
        Ok(Value::Array(frontier.iter().map(|(id, triples)| serde_json::to_value(entity_view(id, triples)).unwrap_or(Value::Null)).collect()))
    }

    async fn path_traverse(&self, args: PathTraverseArgs) -> Result<Value, RpcError> {
        let start = EntityId::parse(args.start_id)?;
        let start_triples = self.executor.lookup(&start).await?.ok_or_else(|| RpcError::not_found("start entity not found"))?;
        let mut frontier = vec![(start, start_triples)];
        for predicate in &args.path {
            let mut refs = self.executor.refs_for_predicate(&frontier, predicate);
            if let Some(max_refs) = args.options.max_refs {
                refs.truncate(max_refs);
            }
            frontier = self.executor.fetch_multi(&refs).await?;
            if frontier.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
        }
        Ok(Value::Array(frontier.iter().map(|(id, triples)| serde_json::to_value(entity_view(id, triples)).unwrap_or(Value::Null)).collect()))
    }

    async fn query(&self, args: QueryArgs) -> Result<Value, RpcError> {
        let parsed = query::parse(&args.query_string)?;
        let plan = self.planner.plan(&parsed)?;
        let result = self.executor.execute(&plan).await?;
        Ok(exec_value_to_json(&result))
    }

    async fn batch_get(&self, args: BatchGetArgs) -> Result<Value, RpcError> {
        let mut result = BatchResult::default();
        for raw_id in args.ids {
            match self.get_entity(GetEntityArgs { id: raw_id }).await {
                Ok(value) => result.push_ok(value),
                Err(err) => result.push_err(err),
            }
        }
        Ok(serde_json::to_value(result)?)
    }

    async fn batch_create(&self, args: BatchCreateArgsAdapter) -> Result<Value, RpcError> {
        let mut result = BatchResult::default();
        for entity in args.entities {
            match self.put_entity(entity).await {
                Ok(view) => result.push_ok(serde_json::to_value(view)?),
                Err(err) => result.push_err(err),
            }
        }
        Ok(serde_json::to_value(result)?)
    }

    async fn batch_execute(&self, args: BatchExecuteArgs) -> Result<Value, RpcError> {
        let mut result = BatchResult::default();
        for op in args.operations {
            let outcome = match op {
                BatchOperation::Get { id } => self.get_entity(GetEntityArgs { id }).await,
                BatchOperation::Create { entity } => self.create_entity(CreateEntityArgs { entity }).await,
                BatchOperation::Update { id, props } => self.update_entity(UpdateEntityArgs { id, props }).await,
                BatchOperation::Delete { id } => self.delete_entity(DeleteEntityArgs { id }).await,
            };
            match outcome {
                Ok(value) => result.push_ok(value),
                Err(err) => result.push_err(err),
            }
        }
        Ok(serde_json::to_value(result)?)
    }
    /// C6 read path: prefix full-text search, scoped to one predicate or
    /// across every initialized one (spec §4.6).
    async fn fts_search(&self, args: FtsSearchArgs) -> Result<Value, RpcError> {
        let hits = self.index.fts().search(&args.query, args.predicate.as_deref())?;
        Ok(Value::Array(hits.iter().map(|id| Value::String(id.as_str().to_string())).collect()))
    }

    /// C6 read path: approximate k-nearest-neighbor search against one
    /// predicate's HNSW index.
    async fn vector_search(&self, args: VectorSearchArgs) -> Result<Value, RpcError> {
        let index = self
            .index
            .vector_index(&args.predicate)
            .ok_or_else(|| RpcError::not_found("no vector index for this predicate"))?;
        let hits = index.search(&args.query, args.k, args.ef).await?;
        Ok(Value::Array(
            hits.iter().map(|(id, distance)| serde_json::json!({ "id": id.as_str(), "distance": distance })).collect(),
        ))
    }

    /// C6 read path: bounding-box or nearest-k search against the geo
    /// index's `GEO_POINT` values (spec §4.6's point-only query surface).
    async fn geo_search(&self, args: GeoSearchArgs) -> Result<Value, RpcError> {
        match args {
            GeoSearchArgs::Bbox { min_lat, min_lng, max_lat, max_lng } => {
                let hits = self.index.geo().query_bbox(min_lat, min_lng, max_lat, max_lng);
                Ok(Value::Array(hits.iter().map(|id| Value::String(id.as_str().to_string())).collect()))
            }
            GeoSearchArgs::Nearest { lat, lng, k } => {
                let hits = self.index.geo().nearest_k(lat, lng, k);
                Ok(Value::Array(
                    hits.iter()
                        .map(|(id, meters)| serde_json::json!({ "id": id.as_str(), "distanceMeters": meters }))
                        .collect(),
                ))
            }
        }
    }
}

/// `BatchCreateArgs` re-exposed under a name that doesn't collide with the
/// `entities: Vec<EntityInput>` field destructure above.
type BatchCreateArgsAdapter = crate::methods::BatchCreateArgs;

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, RpcError> {
    serde_json::from_value(args).map_err(|e| RpcError::new(RpcErrorCode::MissingParameter, "missing or malformed arguments").with_details(e.to_string()))
}

fn entity_view(id: &EntityId, triples: &[Triple]) -> EntityView {
    let mut properties = serde_json::Map::with_capacity(triples.len());
    for triple in triples {
        properties.insert(triple.predicate.as_str().to_string(), typed_value_to_json(&triple.object));
    }
    EntityView { id: id.as_str().to_string(), properties }
}

fn exec_value_to_json(value: &edgegraph_exec::ExecValue) -> Value {
    use edgegraph_exec::ExecValue;
    match value {
        ExecValue::Null => Value::Null,
        ExecValue::Scalar(v) => typed_value_to_json(v),
        ExecValue::List(items) => Value::Array(items.iter().map(exec_value_to_json).collect()),
        ExecValue::Entity { id, fields, triples } => {
            let mut out = serde_json::Map::new();
            out.insert("id".to_string(), Value::String(id.as_str().to_string()));
            if fields.is_empty() {
                out.insert("properties".to_string(), Value::Object(entity_view(id, triples).properties));
            } else {
                for (name, value) in fields {
                    out.insert(name.clone(), exec_value_to_json(value));
                }
            }
            Value::Object(out)
        }
    }
}
