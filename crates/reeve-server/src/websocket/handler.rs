//! WebSocket message dispatch — parses incoming text as an
//! [`RpcRequest`] and routes it through the connection's [`Root`].

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use reeve_rpc::errors;
use reeve_rpc::registry::Root;
use reeve_rpc::types::{RpcRequest, RpcResponse};

/// Fallback JSON for when response serialization itself fails.
const SERIALIZATION_FALLBACK: &str =
    r#"{"id":"unknown","success":false,"error":{"code":"INTERNAL_ERROR","message":"response serialization failed"}}"#;

/// Result of handling one WebSocket text frame.
pub struct HandleResult {
    /// Serialized JSON response to send back.
    pub response_json: String,
    /// The addressed method, `Root(v).Name` (empty if parse failed).
    pub method: String,
    /// Typed response, for callers that need structure without re-parsing.
    pub response: RpcResponse,
}

fn serialize(response: &RpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        SERIALIZATION_FALLBACK.to_owned()
    })
}

/// Handle an incoming WebSocket text message.
///
/// Parses the frame as an [`RpcRequest`] and dispatches through `root` under
/// `cancel`; a frame that is not valid JSON gets an `INVALID_PARAMS`
/// response with id `"unknown"`.
#[instrument(skip_all, fields(method))]
pub async fn handle_message(
    message: &str,
    root: &Root,
    cancel: &CancellationToken,
) -> HandleResult {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(request) => request,
        Err(e) => {
            warn!("invalid JSON frame received");
            let response = RpcResponse::error(
                "unknown",
                errors::INVALID_PARAMS,
                format!("invalid JSON: {e}"),
            );
            return HandleResult {
                response_json: serialize(&response),
                method: String::new(),
                response,
            };
        }
    };

    let method = format!("{}({}).{}", request.root, request.version, request.method);
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(%method, id = %request.id, "dispatching RPC");

    let response = root.dispatch(request, cancel).await;
    HandleResult {
        response_json: serialize(&response),
        method,
        response,
    }
}
