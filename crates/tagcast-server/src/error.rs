//! Server error types.

use tagcast_core::ConfigError;
use tagcast_protocol::CodecError;
use thiserror::Error;

/// Errors that end a listener or a single session.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure.
    #[cfg(feature = "tokio-runtime")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A server message could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The server configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection's outbound queue is gone.
    #[error("Connection closed")]
    ConnectionClosed,
}
