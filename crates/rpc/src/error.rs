//! The RPC error taxonomy (spec §6/§7): a fixed code enum, the `RpcError`
//! carrier, and conversions from every collaborator crate's error type.

use serde::Serialize;
use thiserror::Error;

/// Fixed enum of RPC error codes (spec §4.10/§6 — exhaustive, do not add
/// variants without updating both envelope shapes documented there).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RpcErrorCode {
    #[serde(rename = "BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "METHOD_NOT_ALLOWED")]
    MethodNotAllowed,
    #[serde(rename = "NOT_IMPLEMENTED")]
    NotImplemented,
    #[serde(rename = "PARSE_ERROR")]
    ParseError,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "CONFLICT")]
    Conflict,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "INVALID_REQUEST")]
    InvalidRequest,
    #[serde(rename = "MISSING_ATTACHMENT")]
    MissingAttachment,
    #[serde(rename = "MISSING_PARAMETER")]
    MissingParameter,
    #[serde(rename = "QUERY_FAILED")]
    QueryFailed,
    #[serde(rename = "RPC_ERROR")]
    RpcError,
    #[serde(rename = "UNKNOWN_METHOD")]
    UnknownMethod,
}

/// Caps how much of a raw caller-supplied string ends up in an error
/// message (spec §7: "never include... un-truncated user input longer
/// than ~100 characters").
const MAX_DETAIL_LEN: usize = 100;

pub(crate) fn truncate_detail(raw: impl Into<String>) -> String {
    let raw = raw.into();
    if raw.chars().count() <= MAX_DETAIL_LEN {
        raw
    } else {
        let mut truncated: String = raw.chars().take(MAX_DETAIL_LEN).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(truncate_detail(details));
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    pub fn unknown_method(name: &str) -> Self {
        Self::new(RpcErrorCode::UnknownMethod, format!("unknown method: {}", truncate_detail(name)))
    }

    pub fn connection_closed() -> Self {
        Self::new(RpcErrorCode::InvalidRequest, "Connection closed")
    }
}

impl From<edgegraph_types::ValidationError> for RpcError {
    fn from(e: edgegraph_types::ValidationError) -> Self {
        RpcError::new(RpcErrorCode::ValidationError, "input failed validation").with_details(e.to_string())
    }
}

impl From<edgegraph_query::ParseError> for RpcError {
    fn from(e: edgegraph_query::ParseError) -> Self {
        RpcError::new(RpcErrorCode::ParseError, format!("query syntax error at position {}", e.position))
            .with_details(e.message.clone())
    }
}

impl From<edgegraph_planner::PlanError> for RpcError {
    fn from(e: edgegraph_planner::PlanError) -> Self {
        RpcError::new(RpcErrorCode::QueryFailed, "query could not be planned").with_details(e.to_string())
    }
}

impl From<edgegraph_exec::ExecError> for RpcError {
    fn from(e: edgegraph_exec::ExecError) -> Self {
        match e {
            edgegraph_exec::ExecError::ShardNotFound(_) => {
                RpcError::new(RpcErrorCode::InternalError, "no shard is registered for this request").with_details(e.to_string())
            }
            edgegraph_exec::ExecError::InvalidSourceId(inner) => RpcError::from(inner),
            edgegraph_exec::ExecError::Store(inner) => RpcError::from(inner),
        }
    }
}

impl From<edgegraph_store::StoreError> for RpcError {
    fn from(e: edgegraph_store::StoreError) -> Self {
        use edgegraph_store::{BlobError, StoreError};
        match &e {
            StoreError::Validation(_) => RpcError::new(RpcErrorCode::ValidationError, "triple failed validation").with_details(e.to_string()),
            StoreError::Timeout(_) => RpcError::new(RpcErrorCode::Timeout, "storage operation timed out"),
            StoreError::Blob(BlobError::Unauthorized) => RpcError::new(RpcErrorCode::Forbidden, "blob store denied the request"),
            _ => RpcError::new(RpcErrorCode::InternalError, "storage operation failed").with_details(e.to_string()),
        }
    }
}

impl From<edgegraph_index::FtsQueryError> for RpcError {
    fn from(e: edgegraph_index::FtsQueryError) -> Self {
        use edgegraph_index::FtsErrorCode;
        match e.code {
            FtsErrorCode::TableNotFound => RpcError::new(RpcErrorCode::NotFound, "no fts index for this predicate").with_details(e.to_string()),
            FtsErrorCode::QueryError => RpcError::new(RpcErrorCode::BadRequest, "invalid fts query").with_details(e.to_string()),
        }
    }
}

impl From<edgegraph_index::IndexError> for RpcError {
    fn from(e: edgegraph_index::IndexError) -> Self {
        RpcError::new(RpcErrorCode::InternalError, "index operation failed").with_details(e.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::new(RpcErrorCode::BadRequest, "malformed request arguments").with_details(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_details_are_truncated() {
        let long = "x".repeat(500);
        let err = RpcError::bad_request("oops").with_details(long);
        assert!(err.details.unwrap().chars().count() <= MAX_DETAIL_LEN + 1);
    }

    #[test]
    fn unknown_method_carries_the_name() {
        let err = RpcError::unknown_method("frobnicate");
        assert_eq!(err.code, RpcErrorCode::UnknownMethod);
        assert!(err.message.contains("frobnicate"));
    }
}
