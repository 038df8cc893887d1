//! tagcast WebSocket server.
//!
//! One listener serves both channels. The request path chosen during the
//! WebSocket handshake decides whether a connection joins the values hub
//! or the events hub; any other path is refused with 404.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use tagcast_core::{ConfigError, ServerSettings};
use tagcast_protocol::ChannelKind;

use crate::channel::{EventsChannel, ValuesChannel};
use crate::error::ServerError;
use crate::hub::Hub;
use crate::session::Session;
use crate::stats::ChannelStatistics;

/// Configuration for the tagcast server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported on the status endpoint.
    pub name: String,
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Path of the values channel.
    pub values_path: String,
    /// Path of the events channel.
    pub events_path: String,
    /// Longest a push may wait on a full observer queue.
    pub send_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "tagcast-server".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            values_path: "/actual_data".to_string(),
            events_path: "/events".to_string(),
            send_timeout: Duration::from_millis(1000),
            outbound_queue: 64,
        }
    }
}

impl ServerConfig {
    /// Build a server configuration from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let bind_addr = settings
            .bind_addr
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                field: "bindAddr",
                reason: format!("{e}"),
            })?;

        Ok(Self {
            bind_addr,
            values_path: settings.values_path.clone(),
            events_path: settings.events_path.clone(),
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            outbound_queue: settings.outbound_queue,
            ..Self::default()
        })
    }

    /// Which channel a request path selects. A trailing slash is ignored.
    pub fn route(&self, path: &str) -> Option<ChannelKind> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        if path == self.values_path {
            Some(ChannelKind::Values)
        } else if path == self.events_path {
            Some(ChannelKind::Events)
        } else {
            None
        }
    }
}

/// Snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub values: ChannelStatistics,
    pub events: ChannelStatistics,
}

/// Read-only view of a running server, usable after [`LiveServer::run`]
/// has taken ownership of the server itself.
#[derive(Clone)]
pub struct ServerHandle {
    name: String,
    started_at: DateTime<Utc>,
    values: Arc<Hub<ValuesChannel>>,
    events: Arc<Hub<EventsChannel>>,
}

impl ServerHandle {
    pub fn values(&self) -> &Arc<Hub<ValuesChannel>> {
        &self.values
    }

    pub fn events(&self) -> &Arc<Hub<EventsChannel>> {
        &self.events
    }

    pub async fn status(&self) -> ServerStatus {
        ServerStatus {
            name: self.name.clone(),
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            values: self.values.statistics().await,
            events: self.events.statistics().await,
        }
    }
}

/// The tagcast live data server.
pub struct LiveServer {
    config: ServerConfig,
    started_at: DateTime<Utc>,
    values: Arc<Hub<ValuesChannel>>,
    events: Arc<Hub<EventsChannel>>,
}

impl LiveServer {
    /// Create a server with empty stores.
    pub fn new(config: ServerConfig) -> Self {
        let values = Arc::new(Hub::new(config.send_timeout));
        let events = Arc::new(Hub::new(config.send_timeout));
        Self {
            config,
            started_at: Utc::now(),
            values,
            events,
        }
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            name: self.config.name.clone(),
            started_at: self.started_at,
            values: self.values.clone(),
            events: self.events.clone(),
        }
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            "tagcast server listening on {} ({} values, {} events)",
            listener.local_addr()?,
            self.config.values_path,
            self.config.events_path
        );

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let config = self.config.clone();
                    let values = self.values.clone();
                    let events = self.events.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, config, values, events).await
                        {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("No channel at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: ServerConfig,
    values: Arc<Hub<ValuesChannel>>,
    events: Arc<Hub<EventsChannel>>,
) -> Result<(), ServerError> {
    debug!("New connection from {}", addr);

    let mut route = None;
    let mut requested = String::new();
    let handshake = accept_hdr_async(stream, |req: &Request, resp: Response| {
        requested = req.uri().path().to_string();
        match config.route(&requested) {
            Some(kind) => {
                route = Some(kind);
                Ok(resp)
            }
            None => Err(not_found(&requested)),
        }
    })
    .await;

    let ws = match (handshake, route) {
        (Ok(ws), Some(_)) => ws,
        (Err(_), None) if !requested.is_empty() => {
            warn!("Refused connection from {} to unknown path {}", addr, requested);
            return Ok(());
        }
        (Err(e), _) => return Err(e.into()),
        (Ok(_), None) => return Ok(()),
    };

    let (sink, stream) = ws.split();
    match route {
        Some(ChannelKind::Values) => {
            Session::new(values, addr)
                .run(sink, stream, config.outbound_queue, config.send_timeout)
                .await
        }
        Some(ChannelKind::Events) => {
            Session::new(events, addr)
                .run(sink, stream, config.outbound_queue, config.send_timeout)
                .await
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let config = ServerConfig::default();
        assert_eq!(config.route("/actual_data"), Some(ChannelKind::Values));
        assert_eq!(config.route("/actual_data/"), Some(ChannelKind::Values));
        assert_eq!(config.route("/events"), Some(ChannelKind::Events));
        assert_eq!(config.route("/"), None);
        assert_eq!(config.route("/other"), None);
        assert_eq!(config.route("/actual_data/x"), None);
    }

    #[test]
    fn test_from_settings() {
        let settings = ServerSettings::from_json(
            r#"{"bindAddr": "127.0.0.1:9100", "valuesPath": "/v", "sendTimeoutMs": 250}"#,
        )
        .unwrap();
        let config = ServerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9100)));
        assert_eq!(config.route("/v"), Some(ChannelKind::Values));
        assert_eq!(config.route("/events"), Some(ChannelKind::Events));
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.outbound_queue, 64);
    }

    #[test]
    fn test_from_settings_rejects_bad_address() {
        let settings = ServerSettings::from_json(r#"{"bindAddr": "not an address"}"#).unwrap();
        let err = ServerConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "bindAddr",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_handle_status_reports_both_channels() {
        let server = LiveServer::new(ServerConfig::default());
        let status = server.handle().status().await;

        assert_eq!(status.name, "tagcast-server");
        assert_eq!(status.values.sessions, 0);
        assert_eq!(status.events.keys_held, 0);
        assert!(status.uptime_seconds >= 0);
    }
}
