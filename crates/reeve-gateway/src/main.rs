//! # reeve-gateway
//!
//! Gateway server binary — wires the fleet, runner, registry, and server
//! together and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reeve_rpc::context::GatewayContext;
use reeve_rpc::handlers::register_all;
use reeve_rpc::registry::MethodRegistry;
use reeve_runtime::{Fleet, Runner};
use reeve_server::config::GatewayConfig;
use reeve_server::metrics::install_recorder;
use reeve_server::server::GatewayServer;

/// How long shutdown waits for the server task and background fleet work.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// reeve gateway server.
#[derive(Parser, Debug)]
#[command(name = "reeve-gateway", about = "Model-management RPC gateway")]
struct Cli {
    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum concurrent WebSocket connections (overrides config).
    #[arg(long)]
    max_connections: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config =
        GatewayConfig::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }

    let metrics_handle = install_recorder();

    // Runtime state: the fleet directory seeded from config, and the
    // single-flight runner that coalesces refreshes.
    let fleet = Arc::new(Fleet::new());
    for seed in &config.controllers {
        match fleet.add_controller(&seed.name, &seed.address) {
            Ok(id) => info!(name = %seed.name, %id, "registered controller"),
            Err(e) => warn!(name = %seed.name, error = %e, "skipping configured controller"),
        }
    }
    let runner = Arc::new(Runner::new());

    let ctx = GatewayContext::new(Arc::clone(&fleet), Arc::clone(&runner));
    let registry = Arc::new(MethodRegistry::new());
    register_all(&registry, &ctx);

    let server = GatewayServer::new(
        config,
        Arc::clone(&registry),
        Arc::clone(&runner),
        metrics_handle,
    );
    let (addr, server_handle) = server.listen().await.context("failed to bind")?;
    info!(%addr, controllers = fleet.controller_count(), "reeve gateway ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("interrupt received, shutting down");

    server
        .shutdown()
        .graceful_shutdown(vec![server_handle], SHUTDOWN_TIMEOUT)
        .await;

    // Let in-flight fleet refreshes finish before exiting.
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, runner.wait())
        .await
        .is_err()
    {
        warn!("timed out waiting for background fleet work");
    }

    info!("goodbye");
    Ok(())
}
