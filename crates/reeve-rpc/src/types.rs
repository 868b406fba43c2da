//! Wire-format types for the gateway's WebSocket protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming RPC request from a client.
///
/// `root`, `version`, and `method` together address a registered method;
/// `object_id` addresses an entity within the root and is empty for methods
/// that do not take one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    /// Client-chosen request identifier, echoed in the response.
    pub id: String,
    /// Root name (e.g. `Controller`).
    pub root: String,
    /// Facade version.
    pub version: u32,
    /// Object identifier within the root; empty when not addressing one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_id: String,
    /// Method name (e.g. `List`).
    pub method: String,
    /// Optional parameters payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Outgoing RPC response to a client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoed request identifier.
    pub id: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Result payload; absent for methods without a result and on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload (present when `success == false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body inside an [`RpcResponse`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Machine-readable error code (e.g. `NOT_IMPLEMENTED`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RpcResponse {
    /// Build a success response. `result` is `None` for methods that return
    /// no payload.
    pub fn success(id: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            id: id.into(),
            success: true,
            result,
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(RpcErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// Build an error response from an [`crate::errors::RpcError`].
    pub fn from_error(id: impl Into<String>, err: &crate::errors::RpcError) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(err.to_error_body()),
        }
    }
}
