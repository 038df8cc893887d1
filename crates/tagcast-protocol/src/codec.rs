//! WebSocket message codec for the tagcast protocol.
//!
//! Frames are classified by the keys of their top-level JSON object, in
//! priority order `update`, `get`, `get_all`. The first key present decides
//! the request kind; the payload under it must then match that kind's shape.

use serde::Serialize;
use serde_json::Value;
use tagcast_core::{EventUpdate, TaggedSample};
use thiserror::Error;

use crate::messages::{ClientRequest, EventsUpdateRequest, GetRequest, ValuesUpdateRequest};

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is valid JSON but not an object.
    #[error("Expected a JSON object")]
    NotAnObject,

    /// None of the known request keys is present.
    #[error("Unknown message type")]
    UnknownMessage,

    /// A known request key carries a payload of the wrong shape.
    #[error("Invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Received binary frame instead of text.
    #[error("Expected text frame, received binary")]
    BinaryFrame,

    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[source] serde_json::Error),
}

/// Request keys in classification priority order.
const UPDATE: &str = "update";
const GET: &str = "get";
const GET_ALL: &str = "get_all";

/// Find the highest-priority request key present in a frame.
fn classify<'a>(text: &str, accepted: &[&'a str]) -> Result<&'a str, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::InvalidJson)?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;
    accepted
        .iter()
        .copied()
        .find(|key| object.contains_key(*key))
        .ok_or(CodecError::UnknownMessage)
}

fn payload<'de, T: serde::Deserialize<'de>>(
    text: &'de str,
    kind: &'static str,
) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::InvalidPayload { kind, source })
}

/// Decode a frame received on the values channel.
pub fn decode_values_request(text: &str) -> Result<ClientRequest<Vec<TaggedSample>>, CodecError> {
    match classify(text, &[UPDATE, GET, GET_ALL])? {
        UPDATE => {
            let req: ValuesUpdateRequest = payload(text, UPDATE)?;
            Ok(ClientRequest::Update(req.update))
        }
        GET => {
            let req: GetRequest = payload(text, GET)?;
            Ok(ClientRequest::Get(req.get))
        }
        _ => Ok(ClientRequest::GetAll),
    }
}

/// Decode a frame received on the events channel.
///
/// The events channel has no bulk query; `get_all` is an unknown message.
pub fn decode_events_request(text: &str) -> Result<ClientRequest<EventUpdate>, CodecError> {
    match classify(text, &[UPDATE, GET])? {
        UPDATE => {
            let req: EventsUpdateRequest = payload(text, UPDATE)?;
            Ok(ClientRequest::Update(req.update))
        }
        _ => {
            let req: GetRequest = payload(text, GET)?;
            Ok(ClientRequest::Get(req.get))
        }
    }
}

/// Encode a server message to JSON string for WebSocket transmission.
pub fn encode<T: Serialize + ?Sized>(msg: &T) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::SerializeError)
}
