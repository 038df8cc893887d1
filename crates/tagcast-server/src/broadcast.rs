//! Connection list and fan-out for one channel.
//!
//! Every open connection is represented by the sending half of its
//! outbound queue plus its subscription. Both live behind a single lock so
//! that registering or removing a connection can never interleave with a
//! fan-out round that is iterating them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::subscription::{ConnectionId, Subscription, SubscriptionRegistry};

/// Sending half of a connection's outbound frame queue.
pub type Outbound = mpsc::Sender<Message>;

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Observers whose subscription matched part of the update.
    pub matched: usize,
    /// Deltas queued successfully.
    pub delivered: usize,
    /// Deltas dropped because the observer was closed or too slow.
    pub failed: usize,
}

#[derive(Default)]
struct Sessions {
    peers: BTreeMap<ConnectionId, Outbound>,
    registry: SubscriptionRegistry,
}

/// Open connections of one channel and their subscriptions.
pub struct Broadcaster {
    sessions: RwLock<Sessions>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    ///
    /// `send_timeout` bounds how long a push may wait on a full observer
    /// queue before that observer is skipped for the round.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Add a connection with an empty subscription.
    pub async fn register(&self, outbound: Outbound) -> ConnectionId {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut sessions = self.sessions.write().await;
        sessions.peers.insert(id, outbound);
        sessions.registry.register(id);
        id
    }

    /// Remove a connection from the list and the registry.
    ///
    /// Returns false if it was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let had_peer = sessions.peers.remove(&id).is_some();
        let had_entry = sessions.registry.unregister(id);
        had_peer || had_entry
    }

    /// Replace a connection's subscription.
    pub async fn set_subscription(&self, id: ConnectionId, keys: Vec<String>) -> bool {
        self.sessions.write().await.registry.set_subscription(id, keys)
    }

    /// Current subscription of a connection, empty if none.
    pub async fn subscription(&self, id: ConnectionId) -> Vec<String> {
        self.sessions.read().await.registry.get(id)
    }

    /// Number of open connections.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.peers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Push a delta to every connection except `origin`.
    ///
    /// `shape` cuts the update down to one subscription and encodes it;
    /// returning None skips that observer. Observers are visited in
    /// registration order. A closed or slow observer is counted as failed
    /// and the round continues with the next one.
    pub async fn fan_out<F>(&self, origin: ConnectionId, mut shape: F) -> FanOutReport
    where
        F: FnMut(&Subscription) -> Option<String>,
    {
        let sessions = self.sessions.read().await;
        let mut report = FanOutReport::default();

        for (id, outbound) in &sessions.peers {
            if *id == origin {
                continue;
            }
            let Some(text) = sessions.registry.subscription(*id).and_then(&mut shape) else {
                continue;
            };
            report.matched += 1;

            match outbound
                .send_timeout(Message::Text(text), self.send_timeout)
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    debug!("Push to {} timed out, skipping", id);
                    report.failed += 1;
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!("Push to {} failed, connection closed", id);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
