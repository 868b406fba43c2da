//! `GatewayServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, instrument, warn};

use reeve_core::ConnectionId;
use reeve_rpc::registry::MethodRegistry;
use reeve_runtime::Runner;

use crate::config::GatewayConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::ClientConnection;
use crate::websocket::session::run_ws_session;

/// Generates UUIDv7 request IDs for HTTP requests.
#[derive(Clone)]
struct UuidV7RequestId;

impl MakeRequestId for UuidV7RequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        axum::http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Live connections by ID.
    pub connections: Arc<DashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Single-flight runner (surfaced in health).
    pub runner: Arc<Runner>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: GatewayConfig,
    /// Prometheus metrics handle for rendering.
    pub metrics_handle: Arc<PrometheusHandle>,
}

/// The gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    registry: Arc<MethodRegistry>,
    connections: Arc<DashMap<ConnectionId, Arc<ClientConnection>>>,
    shutdown: Arc<ShutdownCoordinator>,
    runner: Arc<Runner>,
    metrics_handle: Arc<PrometheusHandle>,
    start_time: Instant,
}

impl GatewayServer {
    /// Create a new server.
    pub fn new(
        config: GatewayConfig,
        registry: Arc<MethodRegistry>,
        runner: Arc<Runner>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            registry,
            connections: Arc::new(DashMap::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            runner,
            metrics_handle: Arc::new(metrics_handle),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            connections: Arc::clone(&self.connections),
            shutdown: Arc::clone(&self.shutdown),
            runner: Arc::clone(&self.runner),
            start_time: self.start_time,
            config: self.config.clone(),
            metrics_handle: Arc::clone(&self.metrics_handle),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_upgrade_handler))
            .with_state(state)
            // Outermost layers execute first on request, last on response.
            .layer(CatchPanicLayer::new())
            .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidV7RequestId))
    }

    /// Bind and start serving. Returns the bound address and the server
    /// task's join handle.
    #[instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    pub async fn listen(&self) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        let methods = self.registry.methods().len();
        info!(addr = %bound_addr, methods, "gateway started");

        let router = self.router();
        let shutdown_token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("gateway shutdown initiated");
                })
                .await;
            info!("gateway shutdown complete");
        });

        Ok((bound_addr, handle))
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The shared method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// The server configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Number of live WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.connections.len(),
        state.runner.active_count(),
    );
    Json(resp)
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// GET /ws — WebSocket upgrade handler.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let current = state.connections.len();
    if current >= state.config.max_connections {
        warn!(
            current,
            max = state.config.max_connections,
            "connection limit reached, rejecting WebSocket upgrade"
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let id = ConnectionId::new();
    let registry = state.registry;
    let connections = state.connections;
    let config = state.config;
    let shutdown = state.shutdown.token();
    let max_message_size = config.max_message_size;

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, id, registry, connections, config, shutdown)
        }))
}
