//! Channel semantics.
//!
//! The values and events pipelines share one shape: decode, apply, fan
//! out, answer queries. What differs is captured by the [`Channel`] trait:
//! the store's merge rule, how a delta is cut down to one subscription,
//! and how queries are answered.

use serde::Serialize;
use tagcast_core::{EventStore, EventUpdate, LiveStore, TagValueStore, TaggedSample};
use tagcast_protocol::{
    decode_events_request, decode_values_request, ChannelKind, ClientRequest, CodecError,
    EventsGetResponse,
};

use crate::subscription::Subscription;

/// Semantics of one live channel.
pub trait Channel: Send + Sync + 'static {
    /// Which channel this is.
    const KIND: ChannelKind;

    /// Native update shape.
    type Update: Send + Sync + 'static;

    /// Store absorbing the updates.
    type Store: LiveStore<Update = Self::Update> + Default + 'static;

    /// Portion of an update pushed to one observer.
    type Delta: Serialize + Send;

    /// Reply to point and bulk queries.
    type Reply: Serialize + Send;

    /// Classify and decode a text frame.
    fn decode(text: &str) -> Result<ClientRequest<Self::Update>, CodecError>;

    /// Cut an update down to what a subscription can see.
    fn delta(update: &Self::Update, subscription: &Subscription) -> Option<Self::Delta>;

    /// Answer a point query for the given keys.
    fn point_query(store: &Self::Store, keys: &[String]) -> Self::Reply;

    /// Answer a bulk query, or None if the channel has none.
    fn bulk_query(store: &Self::Store) -> Option<Self::Reply>;
}

/// Scalar values served on `/actual_data`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuesChannel;

impl Channel for ValuesChannel {
    const KIND: ChannelKind = ChannelKind::Values;

    type Update = Vec<TaggedSample>;
    type Store = TagValueStore;
    type Delta = Vec<TaggedSample>;
    type Reply = Vec<TaggedSample>;

    fn decode(text: &str) -> Result<ClientRequest<Self::Update>, CodecError> {
        decode_values_request(text)
    }

    fn delta(update: &Self::Update, subscription: &Subscription) -> Option<Self::Delta> {
        subscription.filter_samples(update)
    }

    /// Known tags only, in request order, each at most once.
    fn point_query(store: &Self::Store, keys: &[String]) -> Self::Reply {
        let mut found = store.get_many(keys);
        keys.iter().filter_map(|tag| found.remove(tag)).collect()
    }

    fn bulk_query(store: &Self::Store) -> Option<Self::Reply> {
        Some(store.get_all())
    }
}

/// Discrete event statuses served on `/events`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventsChannel;

impl Channel for EventsChannel {
    const KIND: ChannelKind = ChannelKind::Events;

    type Update = EventUpdate;
    type Store = EventStore;
    type Delta = EventUpdate;
    type Reply = EventsGetResponse;

    fn decode(text: &str) -> Result<ClientRequest<Self::Update>, CodecError> {
        decode_events_request(text)
    }

    fn delta(update: &Self::Update, subscription: &Subscription) -> Option<Self::Delta> {
        subscription.filter_events(update)
    }

    /// Every requested type, unknown ones as an empty map.
    fn point_query(store: &Self::Store, keys: &[String]) -> Self::Reply {
        EventsGetResponse {
            get_response: keys
                .iter()
                .map(|event_type| (event_type.clone(), store.get(event_type)))
                .collect(),
        }
    }

    fn bulk_query(_store: &Self::Store) -> Option<Self::Reply> {
        None
    }
}
