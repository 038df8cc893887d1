//! # tagcast-server
//!
//! Live subscription and broadcast server for tagcast.
//!
//! Two independent channels share one listener:
//! - values (`/actual_data`): last-known sample per tag
//! - events (`/events`): status per event code, grouped by event type
//!
//! Enable features based on target platform:
//! - `tokio-runtime` (default) - WebSocket server on Tokio

pub mod channel;
pub mod error;
pub mod stats;
pub mod subscription;

#[cfg(feature = "tokio-runtime")]
pub mod broadcast;
#[cfg(feature = "tokio-runtime")]
pub mod hub;
#[cfg(feature = "tokio-runtime")]
pub mod server;
#[cfg(feature = "tokio-runtime")]
pub mod session;

pub use channel::{Channel, EventsChannel, ValuesChannel};
pub use error::ServerError;
pub use stats::ChannelStatistics;
pub use subscription::{ConnectionId, Subscription, SubscriptionRegistry};
pub use tagcast_core::{EventStore, EventUpdate, ServerSettings, TagValueStore, TaggedSample};

#[cfg(feature = "tokio-runtime")]
pub use hub::Hub;
#[cfg(feature = "tokio-runtime")]
pub use server::{LiveServer, ServerConfig, ServerHandle, ServerStatus};
