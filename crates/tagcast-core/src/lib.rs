//! # tagcast-core
//!
//! Core tagcast data model and live store implementation.
//!
//! This crate provides:
//! - Data model types (TaggedSample, event status maps)
//! - In-memory "latest known state" stores for values and events
//! - Server settings shared by every frontend
//!
//! This crate is intentionally runtime-agnostic and contains no async code.

pub mod config;
pub mod model;
pub mod store;

pub use config::{ConfigError, ServerSettings};
pub use model::*;
pub use store::{EventStore, LiveStore, TagValueStore};
