//! Subscription management for tagcast connections.
//!
//! This module tracks which tags (or event types) each connection wants
//! pushed to it, and shapes incoming updates down to the part a given
//! subscription can see.

use std::collections::{BTreeMap, HashSet};

use tagcast_core::{EventUpdate, TaggedSample};

/// Identifier of one live connection.
///
/// Identifiers are handed out in accept order and never reused, so ordering
/// by id is ordering by registration. Holding an id does not keep the
/// connection alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The keys one connection is interested in.
///
/// Keeps the requested order for reporting and a set for lookups.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    keys: Vec<String>,
    index: HashSet<String>,
}

impl Subscription {
    pub fn new(keys: Vec<String>) -> Self {
        let index = keys.iter().cloned().collect();
        Self { keys, index }
    }

    /// Keys in the order they were requested.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Samples of an update whose tag is subscribed, in update order.
    ///
    /// Returns None if no sample matches.
    pub fn filter_samples(&self, samples: &[TaggedSample]) -> Option<Vec<TaggedSample>> {
        let filtered: Vec<TaggedSample> = samples
            .iter()
            .filter(|sample| self.contains(&sample.tag))
            .cloned()
            .collect();

        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Event types of an update that are subscribed.
    ///
    /// Statuses come from the update itself, so a partial update stays
    /// partial. Returns None if no event type matches.
    pub fn filter_events(&self, update: &EventUpdate) -> Option<EventUpdate> {
        let filtered: EventUpdate = update
            .iter()
            .filter(|(event_type, _)| self.contains(event_type))
            .map(|(event_type, statuses)| (event_type.clone(), statuses.clone()))
            .collect();

        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }
}

/// Per-connection subscriptions of one channel.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<ConnectionId, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty subscription for a freshly accepted connection.
    pub fn register(&mut self, id: ConnectionId) {
        self.entries.insert(id, Subscription::default());
    }

    /// Replace a connection's subscription wholesale.
    ///
    /// Returns false if the connection is not registered; nothing is
    /// stored in that case.
    pub fn set_subscription(&mut self, id: ConnectionId, keys: Vec<String>) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                *entry = Subscription::new(keys);
                true
            }
            None => false,
        }
    }

    /// Current subscription keys, empty if none.
    pub fn get(&self, id: ConnectionId) -> Vec<String> {
        self.entries
            .get(&id)
            .map(|sub| sub.keys().to_vec())
            .unwrap_or_default()
    }

    pub fn subscription(&self, id: ConnectionId) -> Option<&Subscription> {
        self.entries.get(&id)
    }

    /// Remove a connection. Removing an unknown connection is a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
