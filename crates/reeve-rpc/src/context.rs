//! Shared state captured by the gateway's handlers.

use std::sync::Arc;
use std::time::Instant;

use reeve_runtime::{Fleet, Runner};

/// Dependencies every handler closure captures at registration time.
#[derive(Clone)]
pub struct GatewayContext {
    /// The controller/model directory.
    pub fleet: Arc<Fleet>,
    /// Single-flight runner for background fleet work.
    pub runner: Arc<Runner>,
    /// When the gateway process started.
    pub started_at: Instant,
}

impl GatewayContext {
    /// Build a context over fresh runtime state.
    pub fn new(fleet: Arc<Fleet>, runner: Arc<Runner>) -> Self {
        Self {
            fleet,
            runner,
            started_at: Instant::now(),
        }
    }
}
