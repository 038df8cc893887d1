//! Channel statistics collection.
//!
//! Each channel counts its sessions, requests and push outcomes. Counters
//! are plain atomics so sessions can record without taking the hub locks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time statistics of one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    /// Currently open sessions.
    pub sessions: usize,

    /// Keys (tags or event types) held by the channel's store.
    pub keys_held: usize,

    /// Update requests applied to the store.
    pub updates_applied: u64,

    /// Point and bulk queries answered.
    pub queries_answered: u64,

    /// Frames rejected as malformed or unsupported.
    pub frames_rejected: u64,

    /// Deltas queued to observers.
    pub pushes_delivered: u64,

    /// Deltas dropped because the observer was gone or too slow.
    pub pushes_failed: u64,
}

/// Collects statistics for one channel.
#[derive(Debug, Default)]
pub struct ChannelStats {
    sessions: AtomicUsize,
    updates_applied: AtomicU64,
    queries_answered: AtomicU64,
    frames_rejected: AtomicU64,
    pushes_delivered: AtomicU64,
    pushes_failed: AtomicU64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_opened(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_update(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one fan-out round.
    pub fn record_pushes(&self, delivered: usize, failed: usize) {
        self.pushes_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.pushes_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self, keys_held: usize) -> ChannelStatistics {
        ChannelStatistics {
            sessions: self.sessions.load(Ordering::Relaxed),
            keys_held,
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            pushes_delivered: self.pushes_delivered.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
        }
    }
}
