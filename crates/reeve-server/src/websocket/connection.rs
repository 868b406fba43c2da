//! Per-client connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use reeve_core::ConnectionId;

/// A connected WebSocket client.
///
/// Responses are queued onto a bounded channel drained by the connection's
/// writer task; a full or closed channel drops the message and counts it.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Set on any inbound frame, cleared by each heartbeat check.
    alive: AtomicBool,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection around its outbound channel.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text message for the client.
    ///
    /// Returns `false` (and counts the drop) when the channel is full or the
    /// writer has gone away.
    pub fn send(&self, message: String) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(crate::metrics::WS_MESSAGES_DROPPED_TOTAL).increment(1);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound traffic for liveness.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Check and clear the liveness flag.
    ///
    /// Returns `true` if any traffic arrived since the previous check.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
