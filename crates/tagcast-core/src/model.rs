//! tagcast data model types.
//!
//! Two kinds of live telemetry flow through the system:
//! - Scalar values, one [`TaggedSample`] per tag
//! - Discrete events, a status per (event type, event code) pair

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric code identifying one status slot inside an event type.
pub type EventCode = i64;

/// Status reported for an event code.
pub type EventStatus = f64;

/// Statuses of one event type, keyed by event code.
///
/// On the wire the codes are JSON object keys, so `{"1": 5.0}` decodes to
/// code `1`.
pub type EventStatusMap = BTreeMap<EventCode, EventStatus>;

/// Event statuses keyed by event type.
///
/// Used both for incoming updates and for store snapshots.
pub type EventUpdate = BTreeMap<String, EventStatusMap>;

/// The latest sample reported for a scalar tag.
///
/// The tag is the identity; timestamp and value are payload that the
/// store overwrites on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSample {
    /// Unique identifier of the telemetry point
    pub tag: String,

    /// Measurement time as reported by the device
    pub timestamp: i64,

    /// Measured value
    pub value: f64,
}

impl TaggedSample {
    /// Create a new sample.
    pub fn new(tag: impl Into<String>, timestamp: i64, value: f64) -> Self {
        Self {
            tag: tag.into(),
            timestamp,
            value,
        }
    }
}
