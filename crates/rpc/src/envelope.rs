//! The two error envelope shapes the spec fixes (§4.10/§6): HTTP-shaped
//! responses nest under `error`, WebSocket-shaped ones are a flat frame
//! tagged `type: "error"`.

use serde::Serialize;

use crate::error::{RpcError, RpcErrorCode};

#[derive(Debug, Clone, Serialize)]
pub struct HttpErrorBody {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpErrorEnvelope {
    pub error: HttpErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct WsErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RpcError {
    pub fn to_http_envelope(&self) -> HttpErrorEnvelope {
        HttpErrorEnvelope {
            error: HttpErrorBody { code: self.code, message: self.message.clone(), details: self.details.clone() },
        }
    }

    pub fn to_ws_envelope(&self, id: Option<String>) -> WsErrorEnvelope {
        WsErrorEnvelope { kind: "error", code: self.code, message: self.message.clone(), id, details: self.details.clone() }
    }
}
