//! # reeve-server
//!
//! Axum HTTP + `WebSocket` framing layer for the reeve gateway.
//!
//! - HTTP endpoints: `/health`, `/metrics`
//! - `WebSocket` gateway at `/ws`: one [`reeve_rpc::registry::Root`] per
//!   connection, per-request dispatch tasks, heartbeat liveness
//! - Connection teardown kills the root so every in-flight call observes
//!   cancellation
//! - Graceful shutdown via `CancellationToken` coordination

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
