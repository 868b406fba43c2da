//! Pinger and Gateway facades.

use std::sync::Arc;

use serde::Serialize;

use crate::context::GatewayContext;
use crate::registry::MethodRegistry;

/// Result of `Pinger(1).Ping`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    /// Always `true`.
    pub pong: bool,
    /// Server-side ISO-8601 timestamp.
    pub timestamp: String,
}

/// Result of `Gateway(1).Info`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    /// Gateway version.
    pub version: &'static str,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
    /// Registered controllers.
    pub controllers: usize,
    /// Known models.
    pub models: usize,
}

/// Register the Pinger and Gateway roots.
pub fn register(registry: &MethodRegistry, ctx: &GatewayContext) {
    registry.register("Pinger", 1, "Ping", || async {
        PingResult {
            pong: true,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    let started_at = ctx.started_at;
    registry.register("Gateway", 1, "Info", move || {
        let fleet = Arc::clone(&fleet);
        async move {
            GatewayInfo {
                version: env!("CARGO_PKG_VERSION"),
                uptime_secs: started_at.elapsed().as_secs(),
                controllers: fleet.controller_count(),
                models: fleet.model_count(),
            }
        }
    });
}
