//! Per-channel dispatcher.
//!
//! A [`Hub`] owns one channel's store and broadcaster and turns decoded
//! client frames into store mutations, replies and fan-out rounds.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use tagcast_core::LiveStore;
use tagcast_protocol::{encode, ClientRequest, CodecError, ErrorReply, UPDATE_ACK};

use crate::broadcast::{Broadcaster, Outbound};
use crate::channel::Channel;
use crate::error::ServerError;
use crate::stats::{ChannelStatistics, ChannelStats};
use crate::subscription::ConnectionId;

/// Store, connections and statistics of one channel.
pub struct Hub<C: Channel> {
    store: RwLock<C::Store>,
    broadcaster: Broadcaster,
    stats: ChannelStats,
    _channel: PhantomData<C>,
}

impl<C: Channel> Hub<C> {
    /// Create a hub with an empty store.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            store: RwLock::new(C::Store::default()),
            broadcaster: Broadcaster::new(send_timeout),
            stats: ChannelStats::new(),
            _channel: PhantomData,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Read the store under its lock.
    pub async fn with_store<R>(&self, f: impl FnOnce(&C::Store) -> R) -> R {
        let store = self.store.read().await;
        f(&store)
    }

    /// Current statistics of the channel.
    pub async fn statistics(&self) -> ChannelStatistics {
        let keys_held = self.store.read().await.len();
        self.stats.snapshot(keys_held)
    }

    /// Open a session: add it to the connection list and registry.
    pub async fn connect(&self, outbound: Outbound) -> ConnectionId {
        let id = self.broadcaster.register(outbound).await;
        self.stats.session_opened();
        id
    }

    /// Close a session. Closing twice is harmless.
    pub async fn disconnect(&self, id: ConnectionId) {
        if self.broadcaster.unregister(id).await {
            self.stats.session_closed();
        }
    }

    /// Handle one text frame from `origin`.
    ///
    /// Replies go to `reply`, the originator's own outbound queue. An error
    /// means that queue is gone and the session should end.
    pub async fn handle_text(
        &self,
        origin: ConnectionId,
        reply: &Outbound,
        text: &str,
    ) -> Result<(), ServerError> {
        match C::decode(text) {
            Ok(ClientRequest::Update(update)) => self.apply_update(origin, reply, update).await,
            Ok(ClientRequest::Get(keys)) => self.point_query(origin, reply, keys).await,
            Ok(ClientRequest::GetAll) => self.bulk_query(origin, reply).await,
            Err(e) => self.reject(origin, reply, &e).await,
        }
    }

    /// Answer an unusable frame with an error reply.
    ///
    /// Shared state is left untouched.
    pub async fn reject(
        &self,
        origin: ConnectionId,
        reply: &Outbound,
        err: &CodecError,
    ) -> Result<(), ServerError> {
        warn!("Rejected frame from {} on {} channel: {}", origin, C::KIND, err);
        self.stats.record_rejection();
        send_text(reply, encode(&ErrorReply::new(err.to_string()))?).await
    }

    async fn apply_update(
        &self,
        origin: ConnectionId,
        reply: &Outbound,
        update: C::Update,
    ) -> Result<(), ServerError> {
        self.store.write().await.apply(&update);
        self.stats.record_update();

        // The update is applied already, so observers get it even if the
        // originator has gone away in the meantime.
        let acked = send_text(reply, UPDATE_ACK.to_string()).await;

        let report = self
            .broadcaster
            .fan_out(origin, |subscription| {
                let delta = C::delta(&update, subscription)?;
                match encode(&delta) {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("Failed to encode {} delta: {}", C::KIND, e);
                        None
                    }
                }
            })
            .await;
        self.stats.record_pushes(report.delivered, report.failed);
        debug!(
            "Update from {} on {} channel pushed to {}/{} observers",
            origin,
            C::KIND,
            report.delivered,
            report.matched
        );

        acked
    }

    async fn point_query(
        &self,
        origin: ConnectionId,
        reply: &Outbound,
        keys: Vec<String>,
    ) -> Result<(), ServerError> {
        debug!("{} subscribed to {:?} on {} channel", origin, keys, C::KIND);
        // The read guard is held until the reply is queued, so a concurrent
        // update is either in the reply or pushed after it.
        let store = self.store.read().await;
        self.broadcaster.set_subscription(origin, keys.clone()).await;
        let answer = C::point_query(&store, &keys);
        self.stats.record_query();
        send_text(reply, encode(&answer)?).await
    }

    async fn bulk_query(&self, origin: ConnectionId, reply: &Outbound) -> Result<(), ServerError> {
        let store = self.store.read().await;
        let Some(answer) = C::bulk_query(&store) else {
            drop(store);
            return self.reject(origin, reply, &CodecError::UnknownMessage).await;
        };

        debug!("{} cleared its subscription on {} channel", origin, C::KIND);
        self.broadcaster.set_subscription(origin, Vec::new()).await;
        self.stats.record_query();
        send_text(reply, encode(&answer)?).await
    }
}

async fn send_text(reply: &Outbound, text: String) -> Result<(), ServerError> {
    reply
        .send(Message::Text(text))
        .await
        .map_err(|_| ServerError::ConnectionClosed)
}
