//! Connection sessions.
//!
//! A session owns one connection's receive loop. Frames are handled one at
//! a time in arrival order. Everything the session sends, replies and
//! pushed deltas alike, goes through a bounded outbound queue drained by a
//! dedicated writer task, so a slow socket never blocks another session's
//! fan-out for longer than the configured send timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info};

use tagcast_protocol::CodecError;

use crate::broadcast::Outbound;
use crate::channel::Channel;
use crate::error::ServerError;
use crate::hub::Hub;
use crate::subscription::ConnectionId;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// One live connection on a channel.
pub struct Session<C: Channel> {
    hub: Arc<Hub<C>>,
    addr: SocketAddr,
    state: SessionState,
}

impl<C: Channel> Session<C> {
    /// A session for a connection whose handshake has completed.
    pub fn new(hub: Arc<Hub<C>>, addr: SocketAddr) -> Self {
        Self {
            hub,
            addr,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve the connection until the peer goes away.
    ///
    /// Registers the session, runs the receive loop, then removes the
    /// session from the hub whatever the loop's outcome. `drain_timeout`
    /// bounds how long queued frames may take to flush after the loop ends.
    pub async fn run<Tx, Rx>(
        &mut self,
        sink: Tx,
        mut stream: Rx,
        outbound_queue: usize,
        drain_timeout: Duration,
    ) -> Result<(), ServerError>
    where
        Tx: Sink<Message> + Unpin + Send + 'static,
        Tx::Error: std::fmt::Display + Send,
        Rx: Stream<Item = Result<Message, WsError>> + Unpin + Send,
    {
        if self.state != SessionState::Connecting {
            return Ok(());
        }

        let (outbound, queue) = mpsc::channel(outbound_queue);
        let mut writer = tokio::spawn(write_frames(sink, queue, self.addr));

        let id = self.hub.connect(outbound.clone()).await;
        self.state = SessionState::Open;
        info!("Session {} from {} open on {} channel", id, self.addr, C::KIND);

        let result = self.receive(id, &outbound, &mut stream).await;

        self.hub.disconnect(id).await;
        self.state = SessionState::Closed;
        info!("Session {} from {} closed", id, self.addr);

        drop(outbound);
        if timeout(drain_timeout, &mut writer).await.is_err() {
            debug!("Writer for {} did not drain in time, aborting", self.addr);
            writer.abort();
        }

        result
    }

    async fn receive<Rx>(
        &self,
        id: ConnectionId,
        outbound: &Outbound,
        stream: &mut Rx,
    ) -> Result<(), ServerError>
    where
        Rx: Stream<Item = Result<Message, WsError>> + Unpin + Send,
    {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.hub.handle_text(id, outbound, &text).await?;
                }
                Some(Ok(Message::Binary(_))) => {
                    self.hub.reject(id, outbound, &CodecError::BinaryFrame).await?;
                }
                Some(Ok(Message::Ping(data))) => {
                    outbound
                        .send(Message::Pong(data))
                        .await
                        .map_err(|_| ServerError::ConnectionClosed)?;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client {} closed connection", self.addr);
                    return Ok(());
                }
                Some(Ok(_)) => {} // Ignore other message types
                Some(Err(e)) => {
                    info!("Client {} dropped: {}", self.addr, e);
                    return Ok(());
                }
                None => {
                    info!("Client {} disconnected", self.addr);
                    return Ok(());
                }
            }
        }
    }
}

/// Drain a session's outbound queue into its socket.
async fn write_frames<Tx>(mut sink: Tx, mut queue: mpsc::Receiver<Message>, addr: SocketAddr)
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: std::fmt::Display + Send,
{
    while let Some(msg) = queue.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!("Failed to send to {}: {}", addr, e);
            return;
        }
    }
    let _ = sink.close().await;
}
