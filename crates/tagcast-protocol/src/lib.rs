//! # tagcast-protocol
//!
//! tagcast protocol message types and codec.
//!
//! This crate defines the JSON frames exchanged on the values and events
//! WebSocket channels.

pub mod codec;
pub mod messages;

pub use codec::{decode_events_request, decode_values_request, encode, CodecError};
pub use messages::*;
