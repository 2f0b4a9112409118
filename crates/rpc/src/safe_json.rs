//! Bounded JSON parsing at the transport boundary (spec §4.10): nothing
//! reaches a method handler until it has passed a size, nesting-depth,
//! and key-count check.

use serde_json::Value;
use thiserror::Error;

use crate::error::{RpcError, RpcErrorCode};

pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_KEYS: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct SafeParseLimits {
    pub max_size: usize,
    pub max_depth: usize,
    pub max_keys: usize,
}

impl Default for SafeParseLimits {
    fn default() -> Self {
        Self { max_size: DEFAULT_MAX_SIZE, max_depth: DEFAULT_MAX_DEPTH, max_keys: DEFAULT_MAX_KEYS }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SafeParseError {
    #[error("request body of {size} bytes exceeds the {max} byte limit")]
    SizeExceeded { size: usize, max: usize },
    #[error("request nests {depth} levels deep, exceeding the limit of {max}")]
    DepthExceeded { depth: usize, max: usize },
    #[error("request contains {keys} object keys, exceeding the limit of {max}")]
    KeysExceeded { keys: usize, max: usize },
    #[error("request body is not valid JSON: {0}")]
    ParseError(String),
}

impl From<SafeParseError> for RpcError {
    fn from(e: SafeParseError) -> Self {
        let code = match &e {
            SafeParseError::ParseError(_) => RpcErrorCode::ParseError,
            SafeParseError::SizeExceeded { .. } | SafeParseError::DepthExceeded { .. } | SafeParseError::KeysExceeded { .. } => {
                RpcErrorCode::BadRequest
            }
        };
        RpcError::new(code, e.to_string())
    }
}

/// Parses `bytes` into a `Value`, rejecting it before any handler sees it
/// if it violates `limits`. Size is checked first (cheapest, and avoids
/// running the parser at all over an oversized body); depth and key count
/// are checked by walking the already-parsed tree.
pub fn parse_safe(bytes: &[u8], limits: &SafeParseLimits) -> Result<Value, SafeParseError> {
    if bytes.len() > limits.max_size {
        return Err(SafeParseError::SizeExceeded { size: bytes.len(), max: limits.max_size });
    }
    let value: Value = serde_json::from_slice(bytes).map_err(|e| SafeParseError::ParseError(e.to_string()))?;
    let mut keys = 0usize;
    check_bounds(&value, 0, limits, &mut keys)?;
    Ok(value)
}

fn check_bounds(value: &Value, depth: usize, limits: &SafeParseLimits, keys: &mut usize) -> Result<(), SafeParseError> {
    if depth > limits.max_depth {
        return Err(SafeParseError::DepthExceeded { depth, max: limits.max_depth });
    }
    match value {
        Value::Object(map) => {
            *keys += map.len();
            if *keys > limits.max_keys {
                return Err(SafeParseError::KeysExceeded { keys: *keys, max: limits.max_keys });
            }
            for v in map.values() {
                check_bounds(v, depth + 1, limits, keys)?;
            }
        }
        Value::Array(items) => {
            for v in items {
                check_bounds(v, depth + 1, limits, keys)?;
            }
        }
        _ => {}
    }
    Ok(())
}
