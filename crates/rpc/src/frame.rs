//! Batch framing and pipelining (spec §4.10): a batch frame carries an
//! outer id and an array of `{id, method, args}` sub-requests; a
//! sub-request's args may reference another sub-request's result via
//! `{"$ref": "<id>"}`, letting the server chain lookups within one frame
//! without the client round-tripping intermediate data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

#[derive(Debug, Clone, Deserialize)]
pub struct SubRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchFrame {
    pub id: String,
    pub requests: Vec<SubRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl SubResponse {
    fn ok(id: String, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    fn err(id: String, error: RpcError) -> Self {
        Self { id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub id: String,
    pub responses: Vec<SubResponse>,
}

/// Resolves `{"$ref": "<sub-request id>"}` markers in `args` against
/// already-completed results from earlier in the same frame. A `$ref` to
/// a sub-request that hasn't run yet, failed, or doesn't exist is a
/// `BAD_REQUEST`.
fn resolve_refs(args: &Value, completed: &HashMap<String, Value>) -> Result<Value, RpcError> {
    match args {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(ref_id)) = map.get("$ref") {
                    return completed
                        .get(ref_id)
                        .cloned()
                        .ok_or_else(|| RpcError::bad_request(format!("$ref to unresolved sub-request {ref_id}")));
                }
            }
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                resolved.insert(k.clone(), resolve_refs(v, completed)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for v in items {
                resolved.push(resolve_refs(v, completed)?);
            }
            Ok(Value::Array(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Runs a batch frame's sub-requests in order through `dispatch`,
/// threading each completed result forward so later sub-requests can
/// `$ref` it (pipelining). Sub-requests are independent otherwise: one
/// failing does not stop the rest from running.
pub async fn run_batch<F, Fut>(frame: BatchFrame, mut dispatch: F) -> BatchResponse
where
    F: FnMut(String, Value) -> Fut,
    Fut: std::future::Future<Output = Result<Value, RpcError>>,
{
    let mut completed: HashMap<String, Value> = HashMap::new();
    let mut responses = Vec::with_capacity(frame.requests.len());

    for sub in frame.requests {
        let resolved_args = match resolve_refs(&sub.args, &completed) {
            Ok(args) => args,
            Err(err) => {
                responses.push(SubResponse::err(sub.id, err));
                continue;
            }
        };

        match dispatch(sub.method, resolved_args).await {
            Ok(result) => {
                completed.insert(sub.id.clone(), result.clone());
                responses.push(SubResponse::ok(sub.id, result));
            }
            Err(err) => responses.push(SubResponse::err(sub.id, err)),
        }
    }

    BatchResponse { id: frame.id, responses }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn independent_sub_requests_all_run() {
        let frame = BatchFrame {
            id: "batch-1".to_string(),
            requests: vec![
                SubRequest { id: "a".to_string(), method: "echo".to_string(), args: serde_json::json!(1) },
                SubRequest { id: "b".to_string(), method: "echo".to_string(), args: serde_json::json!(2) },
            ],
        };
        let response = run_batch(frame, |_method, args| async move { Ok(args) }).await;
        assert_eq!(response.responses.len(), 2);
        assert_eq!(response.responses[0].result, Some(serde_json::json!(1)));
        assert_eq!(response.responses[1].result, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn a_ref_resolves_an_earlier_subrequests_result() {
        let frame = BatchFrame {
            id: "batch-1".to_string(),
            requests: vec![
                SubRequest { id: "a".to_string(), method: "echo".to_string(), args: serde_json::json!({"value": 7}) },
                SubRequest { id: "b".to_string(), method: "echo".to_string(), args: serde_json::json!({"$ref": "a"}) },
            ],
        };
        let response = run_batch(frame, |_method, args| async move { Ok(args) }).await;
        assert_eq!(response.responses[1].result, Some(serde_json::json!({"value": 7})));
    }

    #[tokio::test]
    async fn a_ref_to_a_missing_subrequest_is_bad_request() {
        let frame = BatchFrame {
            id: "batch-1".to_string(),
            requests: vec![SubRequest { id: "a".to_string(), method: "echo".to_string(), args: serde_json::json!({"$ref": "nope"}) }],
        };
        let response = run_batch(frame, |_method, args| async move { Ok(args) }).await;
        assert!(response.responses[0].error.is_some());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let frame = BatchFrame {
            id: "batch-1".to_string(),
            requests: vec![
                SubRequest { id: "a".to_string(), method: "fail".to_string(), args: Value::Null },
                SubRequest { id: "b".to_string(), method: "echo".to_string(), args: serde_json::json!(3) },
            ],
        };
        let response = run_batch(frame, |method, args| async move {
            if method == "fail" {
                Err(RpcError::bad_request("nope"))
            } else {
                Ok(args)
            }
        })
        .await;
        assert!(response.responses[0].error.is_some());
        assert_eq!(response.responses[1].result, Some(serde_json::json!(3)));
    }
}
