//! Gateway configuration.
//!
//! Loading flow: compiled defaults, then an optional JSON config file merged
//! over them, then `REEVE_*` environment variable overrides on top.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A controller registered into the fleet at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSeed {
    /// Unique controller name.
    pub name: String,
    /// Dial address, `host:port`.
    pub address: String,
}

/// Configuration for the gateway server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat check interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close the connection after this many seconds without client traffic.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Controllers to register at startup.
    pub controllers: Vec<ControllerSeed>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 100,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 4 * 1024 * 1024, // 4 MB
            controllers: Vec::new(),
        }
    }
}

/// Errors from config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Config file is not valid JSON for [`GatewayConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GatewayConfig {
    /// Load configuration: file (when given and present) over defaults, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                debug!(?path, "loading gateway config");
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            Some(path) => {
                debug!(?path, "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `REEVE_*` overrides from a key lookup (the environment in
    /// production; injected in tests).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("REEVE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("REEVE_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(max) = lookup("REEVE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.max_connections = max;
        }
    }
}
