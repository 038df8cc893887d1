//! Live data stores.
//!
//! Each store holds the latest known state of one channel and is rebuilt
//! from scratch on restart. Nothing is ever evicted.

use crate::model::{EventStatusMap, EventUpdate, TaggedSample};
use std::collections::HashMap;

/// Trait for live state stores.
///
/// A store absorbs updates of its channel's native shape. Each call to
/// [`LiveStore::apply`] is atomic at the granularity of the whole update.
pub trait LiveStore: Send + Sync {
    /// Update shape accepted by this store.
    type Update;

    /// Merge an update into the stored state.
    fn apply(&mut self, update: &Self::Update);

    /// Number of keys (tags or event types) currently held.
    fn len(&self) -> usize;

    /// Whether the store holds nothing yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Latest sample per scalar tag.
///
/// The most recently *received* sample wins, whatever its timestamp.
#[derive(Debug, Clone, Default)]
pub struct TagValueStore {
    values: HashMap<String, TaggedSample>,
}

impl TagValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the latest sample for a tag.
    pub fn get(&self, tag: &str) -> Option<&TaggedSample> {
        self.values.get(tag)
    }

    /// Get the latest samples for several tags.
    ///
    /// Tags the store has never seen are omitted from the result.
    pub fn get_many<S: AsRef<str>>(&self, tags: &[S]) -> HashMap<String, TaggedSample> {
        tags.iter()
            .filter_map(|tag| self.values.get(tag.as_ref()))
            .map(|sample| (sample.tag.clone(), sample.clone()))
            .collect()
    }

    /// Snapshot of every sample currently held, in no particular order.
    pub fn get_all(&self) -> Vec<TaggedSample> {
        self.values.values().cloned().collect()
    }
}

impl LiveStore for TagValueStore {
    type Update = Vec<TaggedSample>;

    fn apply(&mut self, update: &Self::Update) {
        for sample in update {
            self.values.insert(sample.tag.clone(), sample.clone());
        }
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Latest status per (event type, event code).
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: EventUpdate,
}

impl EventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the statuses of one event type.
    ///
    /// Unknown types yield an empty map.
    pub fn get(&self, event_type: &str) -> EventStatusMap {
        self.events.get(event_type).cloned().unwrap_or_default()
    }

    /// Full snapshot of every event type.
    pub fn get_all(&self) -> EventUpdate {
        self.events.clone()
    }
}

impl LiveStore for EventStore {
    type Update = EventUpdate;

    fn apply(&mut self, update: &Self::Update) {
        for (event_type, statuses) in update {
            let stored = self.events.entry(event_type.clone()).or_default();
            for (code, status) in statuses {
                stored.insert(*code, *status);
            }
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}
