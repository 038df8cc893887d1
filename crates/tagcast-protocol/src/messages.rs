//! Protocol message types for WebSocket communication.
//!
//! Both channels speak JSON over text frames:
//! - Client → Server: update, get, get_all (values channel only)
//! - Server → Client: acknowledgement text, pushed deltas, query replies,
//!   rejections

use serde::{Deserialize, Serialize};
use tagcast_core::{EventUpdate, TaggedSample};

/// Plain-text acknowledgement sent to the originator of an update.
pub const UPDATE_ACK: &str = "Values updated successfully";

/// The two live channels served by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Scalar tag values (`/actual_data`).
    Values,
    /// Discrete event statuses (`/events`).
    Events,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Values => "values",
            Self::Events => "events",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified client request.
///
/// `U` is the channel's native update shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest<U> {
    /// Apply an update and fan it out.
    Update(U),

    /// Replace the subscription and read the requested keys.
    Get(Vec<String>),

    /// Clear the subscription and read everything.
    GetAll,
}

/// `{"update": [...]}` on the values channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuesUpdateRequest {
    pub update: Vec<TaggedSample>,
}

/// `{"update": {...}}` on the events channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsUpdateRequest {
    pub update: EventUpdate,
}

/// `{"get": [...]}` on either channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub get: Vec<String>,
}

/// Reply to a point query on the events channel.
///
/// # Example
/// ```json
/// { "get_response": { "alarm": { "1": 5.0 }, "door": {} } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsGetResponse {
    pub get_response: EventUpdate,
}

/// Rejection sent back to the originator of an unusable frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
