//! The typed method table (spec §4.10/§6): method names, their argument
//! and return shapes, and the `TypedValue <-> JSON` conversion entity
//! properties travel through the wire as.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use edgegraph_types::{infer_kind, EntityId, TypedValue, ValueKind};

use crate::error::RpcError;

/// The fixed set of RPC methods (spec §6). `parse`/`name` round-trip the
/// wire name so the dispatcher never matches on a bare string more than
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    GetEntity,
    CreateEntity,
    UpdateEntity,
    DeleteEntity,
    Traverse,
    ReverseTraverse,
    PathTraverse,
    Query,
    BatchGet,
    BatchCreate,
    BatchExecute,
    FtsSearch,
    VectorSearch,
    GeoSearch,
}

impl RpcMethod {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "getEntity" => Self::GetEntity,
            "createEntity" => Self::CreateEntity,
            "updateEntity" => Self::UpdateEntity,
            "deleteEntity" => Self::DeleteEntity,
            "traverse" => Self::Traverse,
            "reverseTraverse" => Self::ReverseTraverse,
            "pathTraverse" => Self::PathTraverse,
            "query" => Self::Query,
            "batchGet" => Self::BatchGet,
            "batchCreate" => Self::BatchCreate,
            "batchExecute" => Self::BatchExecute,
            "ftsSearch" => Self::FtsSearch,
            "vectorSearch" => Self::VectorSearch,
            "geoSearch" => Self::GeoSearch,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetEntity => "getEntity",
            Self::CreateEntity => "createEntity",
            Self::UpdateEntity => "updateEntity",
            Self::DeleteEntity => "deleteEntity",
            Self::Traverse => "traverse",
            Self::ReverseTraverse => "reverseTraverse",
            Self::PathTraverse => "pathTraverse",
            Self::Query => "query",
            Self::BatchGet => "batchGet",
            Self::BatchCreate => "batchCreate",
            Self::BatchExecute => "batchExecute",
            Self::FtsSearch => "ftsSearch",
            Self::VectorSearch => "vectorSearch",
            Self::GeoSearch => "geoSearch",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub id: String,
    pub properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetEntityArgs {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntityArgs {
    pub entity: EntityInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEntityArgs {
    pub id: String,
    pub props: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteEntityArgs {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraverseOptions {
    pub max_refs: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraverseArgs {
    pub start_id: String,
    pub predicate: String,
    #[serde(default)]
    pub options: TraverseOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseTraverseArgs {
    pub target_id: String,
    pub predicate: String,
    #[serde(default)]
    pub options: TraverseOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathTraverseArgs {
    pub start_id: String,
    pub path: Vec<String>,
    #[serde(default)]
    pub options: TraverseOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryArgs {
    pub query_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchGetArgs {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCreateArgs {
    pub entities: Vec<EntityInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchOperation {
    Get { id: String },
    Create { entity: EntityInput },
    Update { id: String, props: serde_json::Map<String, Value> },
    Delete { id: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchExecuteArgs {
    pub operations: Vec<BatchOperation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FtsSearchArgs {
    pub query: String,
    #[serde(default)]
    pub predicate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorSearchArgs {
    pub predicate: String,
    pub query: Vec<f32>,
    pub k: usize,
    #[serde(default)]
    pub ef: Option<usize>,
}

/// Tagged like [`BatchOperation`]: one method, two query shapes (spec §4.6
/// geo predicates support bbox and nearest-k, nothing else).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum GeoSearchArgs {
    Bbox { min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64 },
    Nearest { lat: f64, lng: f64, k: usize },
}

/// Per-operation success/failure reporting (spec §6/§7: "a single bad
/// triple does not fail an entire batch").
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<Value>,
    pub errors: Vec<RpcError>,
}

impl BatchResult {
    pub fn push_ok(&mut self, value: Value) {
        self.success_count += 1;
        self.results.push(value);
    }

    pub fn push_err(&mut self, err: RpcError) {
        self.error_count += 1;
        self.errors.push(err);
    }
}

/// Marker wrapping `{"$entityRef": "<id>"}` / `{"$entityRefs": [...]}` so a
/// JSON caller can express a `Ref`/`RefArray` triple object; every other
/// shape is inferred via [`infer_kind`].
pub fn json_to_typed_value(value: &Value) -> Result<TypedValue, RpcError> {
    if let Value::Object(map) = value {
        if let Some(Value::String(id)) = map.get("$entityRef") {
            return Ok(TypedValue::Ref(EntityId::parse(id.clone())?));
        }
        if let Some(Value::Array(ids)) = map.get("$entityRefs") {
            let refs = ids
                .iter()
                .map(|v| match v {
                    Value::String(s) => EntityId::parse(s.clone()).map_err(RpcError::from),
                    _ => Err(RpcError::bad_request("$entityRefs must be an array of id strings")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(TypedValue::RefArray(refs));
        }
    }

    Ok(match infer_kind(value) {
        ValueKind::Null => TypedValue::Null,
        ValueKind::Bool => TypedValue::Bool(value.as_bool().unwrap_or(false)),
        ValueKind::Int32 => TypedValue::Int32(value.as_i64().unwrap_or_default() as i32),
        ValueKind::Int64 => TypedValue::Int64(value.as_i64().unwrap_or_default()),
        ValueKind::Float64 => TypedValue::Float64(value.as_f64().unwrap_or_default()),
        ValueKind::String => TypedValue::String(value.as_str().unwrap_or_default().to_string()),
        ValueKind::Url => TypedValue::Url(value.as_str().unwrap_or_default().to_string()),
        ValueKind::Duration => TypedValue::Duration(value.as_str().unwrap_or_default().to_string()),
        ValueKind::Json
        | ValueKind::Binary
        | ValueKind::Timestamp
        | ValueKind::Date
        | ValueKind::Ref
        | ValueKind::RefArray
        | ValueKind::GeoPoint
        | ValueKind::GeoPolygon
        | ValueKind::GeoLineString
        | ValueKind::Vector => TypedValue::Json(value.clone()),
    })
}

pub fn typed_value_to_json(value: &TypedValue) -> Value {
    match value {
        TypedValue::Null => Value::Null,
        TypedValue::Bool(b) => Value::Bool(*b),
        TypedValue::Int32(n) => Value::from(*n),
        TypedValue::Int64(n) => Value::from(*n),
        TypedValue::Float64(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        TypedValue::String(s) => Value::String(s.clone()),
        TypedValue::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        TypedValue::Timestamp(n) => Value::from(*n),
        TypedValue::Date(n) => Value::from(*n),
        TypedValue::Duration(s) => Value::String(s.clone()),
        TypedValue::Ref(id) => serde_json::json!({ "$entityRef": id.as_str() }),
        TypedValue::RefArray(ids) => {
            serde_json::json!({ "$entityRefs": ids.iter().map(|i| i.as_str().to_string()).collect::<Vec<_>>() })
        }
        TypedValue::Json(v) => v.clone(),
        TypedValue::GeoPoint(p) => serde_json::to_value(p).unwrap_or(Value::Null),
        TypedValue::GeoPolygon(p) => serde_json::to_value(p).unwrap_or(Value::Null),
        TypedValue::GeoLineString(p) => serde_json::to_value(p).unwrap_or(Value::Null),
        TypedValue::Url(s) => Value::String(s.clone()),
        TypedValue::Vector(v) => serde_json::to_value(v).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in [
            RpcMethod::GetEntity,
            RpcMethod::CreateEntity,
            RpcMethod::UpdateEntity,
            RpcMethod::DeleteEntity,
            RpcMethod::Traverse,
            RpcMethod::ReverseTraverse,
            RpcMethod::PathTraverse,
            RpcMethod::Query,
            RpcMethod::BatchGet,
            RpcMethod::BatchCreate,
            RpcMethod::BatchExecute,
            RpcMethod::FtsSearch,
            RpcMethod::VectorSearch,
            RpcMethod::GeoSearch,
        ] {
            assert_eq!(RpcMethod::parse(method.name()), Some(method));
        }
    }

    #[test]
    fn unknown_method_name_does_not_parse() {
        assert_eq!(RpcMethod::parse("frobnicate"), None);
    }

    #[test]
    fn entity_ref_marker_round_trips() {
        let value = serde_json::json!({ "$entityRef": "https://ex.com/user/2" });
        let typed = json_to_typed_value(&value).unwrap();
        assert!(matches!(typed, TypedValue::Ref(_)));
        assert_eq!(typed_value_to_json(&typed), value);
    }

    #[test]
    fn plain_number_infers_int32() {
        let typed = json_to_typed_value(&serde_json::json!(42)).unwrap();
        assert_eq!(typed, TypedValue::Int32(42));
    }

    #[test]
    fn url_string_infers_url_kind() {
        let typed = json_to_typed_value(&serde_json::json!("https://ex.com")).unwrap();
        assert_eq!(typed, TypedValue::Url("https://ex.com".to_string()));
    }
}
