//! HTTP transport server using Axum.
//!
//! Buffers each request body, hands it to the dispatcher together with an
//! in-memory response sink, and turns the sink back into an HTTP response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
};
use jrpc_server::{BufferedResponse, DispatchContext, HttpRequest, RpcServer};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Path the RPC endpoint is mounted on
    pub path: String,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Log every dispatch at info level instead of debug
    pub verbose_logging: bool,
    /// Deadline seeded into each dispatch context, measured from request arrival
    pub request_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "127.0.0.1".into(),
            path: "/".into(),
            max_body_bytes: 1024 * 1024,
            enable_cors: false,
            verbose_logging: false,
            request_timeout: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state for the transport server.
struct AppState {
    server: Arc<RpcServer>,
    max_body_bytes: usize,
    verbose_logging: bool,
    request_timeout: Option<Duration>,
    /// Requests dispatched so far (for health check)
    served: AtomicU64,
}

/// The transport server: owns the listener task.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound address
    addr: SocketAddr,
}

impl TransportServer {
    /// Build the axum router without binding anything.
    pub fn router(config: &TransportConfig, server: Arc<RpcServer>) -> Router {
        let state = Arc::new(AppState {
            server,
            max_body_bytes: config.max_body_bytes,
            verbose_logging: config.verbose_logging,
            request_timeout: config.request_timeout,
            served: AtomicU64::new(0),
        });

        let app = Router::new()
            .route("/health", get(health_handler))
            .route(&config.path, any(rpc_handler))
            .with_state(state);

        if config.enable_cors {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Bind and start serving in a background task.
    pub async fn start(
        config: TransportConfig,
        server: Arc<RpcServer>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let app = Self::router(&config, server);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        info!("jrpc transport listening on http://{}{}", addr, config.path);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            addr,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("jrpc transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn rpc_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let arrived = Instant::now();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read request body: {e}");
            return (
                StatusCode::BAD_REQUEST,
                format!("rpc: cannot read request body: {e}"),
            )
                .into_response();
        }
    };

    let mut context = DispatchContext::new();
    if let Some(addr) = remote {
        context = context.with_value("remote_addr", addr.to_string());
    }
    if let Some(timeout) = state.request_timeout {
        context = context.with_deadline(arrived + timeout);
    }
    let request = HttpRequest::new(parts.method, parts.headers, body).with_context(context);

    let mut sink = BufferedResponse::new();
    let outcome = state.server.serve(&request, &mut sink);
    state.served.fetch_add(1, Ordering::Relaxed);

    let method = outcome.method.as_deref().unwrap_or("-");
    if state.verbose_logging {
        info!(status = outcome.status.as_u16(), "{} {method}", request.context.request_id());
    } else {
        debug!(status = outcome.status.as_u16(), "{} {method}", request.context.request_id());
    }

    let (status, headers, body) = sink.into_parts();
    (status, headers, body).into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "served": state.served.load(Ordering::Relaxed),
        "methods": state.server.methods(),
    }))
}
