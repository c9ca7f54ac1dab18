//! HTTP dispatch server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ axum bridge ──▶ App::handle ──▶ Router (by Host)
//!                                                        │
//!                          ┌─────────────────────────────┘
//!                          ▼
//!          pool acquire → pre-middlewares → firewall → middlewares
//!                     → handler (adapter) → after-request → pool release
//!                          │
//!     Client Response      ▼
//!     ◀─────────────── Exchange::into_response
//! ```

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use http_dispatch::config::{load_config, ConfigWatcher, DispatchConfig};
use http_dispatch::handler::{self, JsonMap};
use http_dispatch::observability::{logging::init_logging, metrics::init_metrics};
use http_dispatch::{App, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "http-dispatch", version, about = "HTTP request dispatch server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DispatchConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!("http-dispatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_requests_per_minute = config.firewall.max_requests_per_minute,
        block_timeout_secs = config.firewall.block_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = App::from_config(&config);
    register_routes(&app)?;

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        let _ = shutdown_tx.send(());
    });

    HttpServer::new(config, app)
        .run(listener, config_updates, shutdown_rx)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(app: &App) -> Result<(), http_dispatch::routing::PatternError> {
    let router = app.router();

    router.get(
        "/health",
        handler::from_map(|| {
            let mut status = JsonMap::new();
            status.insert("status".into(), json!("ok"));
            Some(status)
        }),
    )?;

    router.get(
        "/version",
        handler::from_json(|| Some(json!({ "version": env!("CARGO_PKG_VERSION") }))),
    )?;

    router.any(
        "/echo/*rest",
        handler::from_ctx_json(|ctx| {
            Some(json!({
                "request_id": ctx.request_id(),
                "path": ctx.path(),
                "rest": ctx.param("rest"),
            }))
        }),
    )?;

    Ok(())
}
