//! `ReactionsServer`: Axum HTTP + `WebSocket` server around the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Span, error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse, StatsResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Hub;
use crate::websocket::transport::WsTransport;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection hub.
    pub hub: Arc<Hub>,
    /// When the server started.
    pub start_time: Instant,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Socket sizing for upgrades.
    pub socket: SocketLimits,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Buffer and message limits applied to each upgrade.
#[derive(Clone, Copy, Debug)]
pub struct SocketLimits {
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Max inbound message size in bytes.
    pub max_message_size: usize,
}

impl From<&ServerConfig> for SocketLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size,
            write_buffer_size: config.write_buffer_size,
            max_message_size: config.max_message_size,
        }
    }
}

/// The reactions server.
pub struct ReactionsServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    started_at: DateTime<Utc>,
    metrics: Option<PrometheusHandle>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
    /// Span current at construction; parent of request spans.
    span: Span,
}

impl ReactionsServer {
    /// Create a new server. Nothing is bound until [`listen`](Self::listen).
    ///
    /// The current span becomes the parent of every request and client span.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(Hub::new(config.hub.clone()));
        Self {
            config,
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            started_at: Utc::now(),
            metrics: None,
            serve_task: Mutex::new(None),
            span: Span::current(),
        }
    }

    /// Serve `/metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            start_time: self.start_time,
            started_at: self.started_at,
            socket: SocketLimits::from(&self.config),
            metrics: self.metrics.clone(),
        };

        let request_timeout = TimeoutLayer::new(self.config.request_timeout);
        let parent = self.span.clone();
        let trace = TraceLayer::new_for_http().make_span_with(move |req: &Request<Body>| {
            tracing::info_span!(
                parent: &parent,
                "request",
                method = %req.method(),
                uri = %req.uri()
            )
        });
        Router::new()
            .route(
                "/ws",
                get(ws_handler).layer(TimeoutLayer::new(self.config.handshake_timeout)),
            )
            .route("/stats", get(stats_handler).layer(request_timeout.clone()))
            .route("/health", get(health_handler).layer(request_timeout.clone()))
            .route("/metrics", get(metrics_handler).layer(request_timeout))
            .layer(trace)
            .with_state(state)
    }

    /// Bind, start the hub, and serve until shutdown. Returns the bound
    /// address; `port = 0` picks a free port.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let _ = self.hub.start();
        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(
            async move {
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(token.cancelled_owned())
                    .await
                {
                    error!(error = %e, "http server failed");
                }
            }
            .instrument(self.span.clone()),
        );
        *self.serve_task.lock() = Some(handle);

        info!(%addr, "reactions server listening");
        Ok(addr)
    }

    /// Stop accepting HTTP requests, then shut the hub down.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.serve_task.lock().take().into_iter().collect();
        let _ = self
            .shutdown
            .graceful_shutdown(handles, Some(self.config.hub.shutdown_timeout))
            .await;
        self.hub.shutdown().await;
        info!("reactions service was shut down");
    }

    /// Connection hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.hub.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let limits = state.socket;
    let span = Span::current();
    ws.read_buffer_size(limits.read_buffer_size)
        .write_buffer_size(limits.write_buffer_size)
        .max_message_size(limits.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            async move {
                if let Err(e) = state.hub.register_connection(WsTransport::new(socket)) {
                    info!(error = %e, "rejected connection");
                }
            }
            .instrument(span)
        })
}

/// GET /stats
async fn stats_handler(State(state): State<AppState>) -> Response {
    let stats = StatsResponse {
        client_count: state.hub.subscribed_count(),
    };
    match serde_json::to_vec(&stats) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(error = %e, "could not encode stats");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.started_at,
        state.hub.subscribed_count(),
        state.hub.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
