//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router that feeds every request to the App
//! - Wire up middleware (tracing, request ID)
//! - Buffer request bodies and run dispatch off the async workers
//! - Apply config reloads and prune firewall state periodically
//! - Shut down gracefully

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::config::DispatchConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::Exchange;

/// How often expired firewall state is dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State injected into the bridge handler.
#[derive(Clone)]
pub struct ServerState {
    pub app: Arc<App>,
    pub config: Arc<ArcSwap<DispatchConfig>>,
}

/// HTTP server feeding an [`App`].
pub struct HttpServer {
    state: ServerState,
}

impl HttpServer {
    pub fn new(config: DispatchConfig, app: Arc<App>) -> Self {
        Self {
            state: ServerState {
                app,
                config: Arc::new(ArcSwap::from_pointee(config)),
            },
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(&self) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(self.state.clone())
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<DispatchConfig> {
        self.state.config.load_full()
    }

    /// Store a reloaded configuration. Firewall thresholds apply to the next request.
    pub fn apply_config(&self, config: DispatchConfig) {
        apply_config(&self.state, config);
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<DispatchConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&reload_state, config);
            }
        });

        let app = self.state.app.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                app.firewall().prune(Instant::now());
            }
        });

        let service = self
            .build_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_config(state: &ServerState, config: DispatchConfig) {
    state.app.firewall_settings().apply(&config.firewall);
    tracing::info!(
        max_requests_per_minute = config.firewall.max_requests_per_minute,
        block_timeout_secs = config.firewall.block_timeout_secs,
        max_hack_attempts = config.firewall.max_hack_attempts,
        "Configuration reloaded"
    );
    state.config.store(Arc::new(config));
}

/// Bridge from Axum to the dispatch core.
async fn dispatch_handler(State(state): State<ServerState>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let max_body_size = state.config.load().listener.max_body_size;

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };

    let mut exchange = Exchange::new(Request::from_parts(parts, body));
    if let Some(addr) = remote_addr {
        exchange = exchange.with_remote_addr(addr);
    }

    let app = state.app.clone();
    match tokio::task::spawn_blocking(move || app.handle(exchange)).await {
        Ok(exchange) => exchange.into_response().map(Body::from),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
