//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No client traffic for the whole timeout window.
    TimedOut,
    /// The connection was torn down while the heartbeat ran.
    Cancelled,
}

/// Watch a connection's liveness flag.
///
/// Every `interval` the flag is checked and cleared; the writer task pings
/// the client on the same cadence, so a live client re-sets the flag with
/// its pong. After `timeout / interval` consecutive silent checks (at least
/// one) the connection is declared dead.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticks = time::interval(interval);
    // The first tick fires immediately; skip it so the client gets a full
    // interval before the first check.
    ticks.tick().await;

    let interval_secs = interval.as_secs().max(1);
    let max_missed = (timeout.as_secs() / interval_secs).max(1);
    let mut missed: u64 = 0;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
