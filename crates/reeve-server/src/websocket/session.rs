//! The per-connection WebSocket session loop.
//!
//! Each session owns a fresh [`Root`] over the shared method registry. Every
//! text frame is dispatched on its own task under the connection's
//! cancellation token, so a slow call never blocks the read loop. When the
//! session ends — client close, read error, heartbeat timeout, or server
//! shutdown — the root is killed and every in-flight call observes
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use reeve_core::ConnectionId;
use reeve_rpc::registry::{MethodRegistry, Root};

use crate::config::GatewayConfig;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::websocket::connection::ClientConnection;
use crate::websocket::handler::handle_message;
use crate::websocket::heartbeat::{HeartbeatResult, run_heartbeat};

/// Outbound channel depth per connection.
const SEND_QUEUE_DEPTH: usize = 256;

/// Drive one WebSocket connection to completion.
pub async fn run_ws_session(
    socket: WebSocket,
    id: ConnectionId,
    registry: Arc<MethodRegistry>,
    connections: Arc<DashMap<ConnectionId, Arc<ClientConnection>>>,
    config: GatewayConfig,
    shutdown: CancellationToken,
) {
    let root = Root::new(registry);
    let cancel = shutdown.child_token();

    let (tx, rx) = mpsc::channel::<String>(SEND_QUEUE_DEPTH);
    let conn = Arc::new(ClientConnection::new(id.clone(), tx));
    let _ = connections.insert(id.clone(), Arc::clone(&conn));
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(conn_id = %id, "client connected");

    let (ws_tx, mut ws_rx) = socket.split();
    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);

    let writer = tokio::spawn(run_writer(ws_tx, rx, ping_interval, cancel.clone()));

    let heartbeat = {
        let conn = Arc::clone(&conn);
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.heartbeat_interval_secs);
        let timeout = Duration::from_secs(config.heartbeat_timeout_secs);
        tokio::spawn(async move {
            if run_heartbeat(Arc::clone(&conn), interval, timeout, cancel.clone()).await
                == HeartbeatResult::TimedOut
            {
                warn!(conn_id = %conn.id, "heartbeat timed out, closing connection");
                cancel.cancel();
            }
        })
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    conn.mark_alive();
                    let root = root.clone();
                    let conn = Arc::clone(&conn);
                    let cancel = cancel.clone();
                    drop(tokio::spawn(async move {
                        let result = handle_message(text.as_str(), &root, &cancel).await;
                        if !conn.send(result.response_json) {
                            warn!(conn_id = %conn.id, method = %result.method, "failed to queue response");
                        }
                    }));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => conn.mark_alive(),
                Some(Ok(Message::Close(_))) | None => {
                    debug!(conn_id = %id, "client closed connection");
                    break;
                }
                Some(Ok(Message::Binary(_))) => {
                    // Protocol is text-only; binary frames only refresh liveness.
                    conn.mark_alive();
                }
                Some(Err(e)) => {
                    debug!(conn_id = %id, error = %e, "read error, closing connection");
                    break;
                }
            },
        }
    }

    // Teardown: cancel every in-flight call, then stop the writer and
    // heartbeat.
    root.kill();
    cancel.cancel();
    let _ = writer.await;
    let _ = heartbeat.await;

    let _ = connections.remove(&id);
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(conn_id = %id, dropped = conn.drop_count(), "client disconnected");
}

/// Writer task: drains queued responses and pings the client on the
/// heartbeat cadence.
async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    ping_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval(ping_interval);
    ticks.tick().await;

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ticks.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
