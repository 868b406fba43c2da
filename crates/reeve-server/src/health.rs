//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the gateway is serving.
    pub status: String,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Controller refreshes currently running.
    pub active_syncs: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, active_syncs: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_syncs,
    }
}
