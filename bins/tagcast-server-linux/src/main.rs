use std::net::SocketAddr;

use anyhow::Context;
use axum::{extract::State, response::Json, routing::get, Router};
use tagcast_core::ServerSettings;
use tagcast_server::{LiveServer, ServerConfig, ServerHandle, ServerStatus};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tagcast server starting...");

    let config = ServerConfig::from_settings(&settings)?;
    let status_addr: Option<SocketAddr> = settings
        .status_addr
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("invalid statusAddr")?;

    let ws_addr = config.bind_addr;
    let values_path = config.values_path.clone();
    let events_path = config.events_path.clone();

    let server = LiveServer::new(config);
    let status = server.handle();

    // Spawn WebSocket server
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    // Start status server
    let http_handle = tokio::spawn(async move {
        match status_addr {
            Some(addr) => {
                if let Err(e) = start_status_server(addr, status).await {
                    tracing::error!("Status server error: {}", e);
                }
            }
            None => std::future::pending::<()>().await,
        }
    });

    tracing::info!("tagcast server ready");
    tracing::info!("   Values: ws://{}{}", ws_addr, values_path);
    tracing::info!("   Events: ws://{}{}", ws_addr, events_path);
    if let Some(addr) = status_addr {
        tracing::info!("   Status: http://{}/status", addr);
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = ws_handle => {
            tracing::warn!("WebSocket server stopped");
        }
        _ = http_handle => {
            tracing::warn!("Status server stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Settings from `TAGCAST_CONFIG` or the first argument, defaults otherwise.
fn load_settings() -> anyhow::Result<ServerSettings> {
    let path = std::env::var("TAGCAST_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1));

    let mut settings = match path {
        Some(path) => ServerSettings::load(&path)
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => ServerSettings::default(),
    };

    if let Ok(bind) = std::env::var("TAGCAST_BIND") {
        settings.bind_addr = bind;
    }

    Ok(settings)
}

/// Start the HTTP status server
async fn start_status_server(addr: SocketAddr, status: ServerHandle) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(status);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn status_handler(State(status): State<ServerHandle>) -> Json<ServerStatus> {
    Json(status.status().await)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
