//! Per-connection handle types
//!
//! These are what the application receives when a connection is classified:
//! an [`AppChannel`] for long-lived bidirectional connections, or a
//! [`CommandRequest`] carrying one-shot reply capabilities.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::event::SseEvent;

/// Metadata about a connection
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// When the connection was attached
    pub connected_at: chrono::DateTime<chrono::Utc>,
    /// Peer address (if the transport has one)
    pub peer_addr: Option<String>,
}

impl ConnectionMetadata {
    pub(crate) fn new(peer_addr: Option<String>) -> Self {
        Self {
            connected_at: chrono::Utc::now(),
            peer_addr,
        }
    }
}

/// A live, long-lived event channel to a connected application peer.
///
/// Produced when a connection's first event is `appConnect`. The handle
/// carries the first event's payload, an outbound sender, an inbound event
/// stream, and a drop capability. Dropping the handle closes the connection.
#[derive(Debug)]
pub struct AppChannel {
    /// Unique connection ID
    pub connection_id: String,
    /// Payload of the `appConnect` event that opened the channel
    pub payload: String,
    /// Connection metadata
    pub metadata: ConnectionMetadata,
    sender: mpsc::Sender<SseEvent>,
    events: mpsc::Receiver<SseEvent>,
    cancel: CancellationToken,
}

impl AppChannel {
    pub(crate) fn new(
        connection_id: String,
        payload: String,
        metadata: ConnectionMetadata,
        sender: mpsc::Sender<SseEvent>,
        events: mpsc::Receiver<SseEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            payload,
            metadata,
            sender,
            events,
            cancel,
        }
    }

    /// Send an event to the peer. Best effort: returns `false` once the
    /// connection is gone instead of erroring.
    pub async fn send(&self, event: SseEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    /// Send a plain "message" event.
    ///
    /// Empty or all-whitespace text is suppressed (returns `false` without
    /// sending) — a blank message carries no information for the peer.
    pub async fn send_message(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        self.send(SseEvent::message(text)).await
    }

    /// Receive the next event from the peer. Returns `None` once the
    /// connection has closed.
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.events.recv().await
    }

    /// Drop the connection. Idempotent; safe to call from any code path,
    /// any number of times.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Check whether the connection is still open
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl Stream for AppChannel {
    type Item = SseEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// The reply written back on a one-shot connection
#[derive(Debug)]
pub(crate) enum Reply {
    Success(String),
    Error(String),
}

impl Reply {
    pub(crate) fn into_event(self) -> SseEvent {
        match self {
            Reply::Success(details) => SseEvent::new("replySuccess", details),
            Reply::Error(message) => SseEvent::new("replyError", message),
        }
    }
}

pub(crate) type ReplyEnvelope = (Reply, oneshot::Sender<Result<()>>);

/// A one-shot command received from a peer, with reply capabilities.
///
/// Exactly one of [`send_success`](Self::send_success) /
/// [`send_error`](Self::send_error) may be invoked, at most once; either
/// writes a fixed-format reply event and closes the connection. Invoking a
/// capability after the socket closed returns [`Error::ConnectionClosed`]
/// rather than panicking; a second invocation returns
/// [`Error::AlreadyReplied`]. Dropping the request without replying closes
/// the connection.
#[derive(Debug)]
pub struct CommandRequest {
    /// Unique connection ID
    pub connection_id: String,
    /// Payload of the `oneShotCommand` event
    pub payload: String,
    /// Connection metadata
    pub metadata: ConnectionMetadata,
    reply: Mutex<Option<oneshot::Sender<ReplyEnvelope>>>,
}

impl CommandRequest {
    pub(crate) fn new(
        connection_id: String,
        payload: String,
        metadata: ConnectionMetadata,
        reply: oneshot::Sender<ReplyEnvelope>,
    ) -> Self {
        Self {
            connection_id,
            payload,
            metadata,
            reply: Mutex::new(Some(reply)),
        }
    }

    /// Reply with a `replySuccess` event and close the connection.
    /// Resolves once the reply bytes were written and the stream shut down.
    pub async fn send_success(&self, details: impl Into<String>) -> Result<()> {
        self.reply(Reply::Success(details.into())).await
    }

    /// Reply with a `replyError` event and close the connection.
    pub async fn send_error(&self, message: impl Into<String>) -> Result<()> {
        self.reply(Reply::Error(message.into())).await
    }

    async fn reply(&self, reply: Reply) -> Result<()> {
        let sender = self
            .reply
            .lock()
            .await
            .take()
            .ok_or(Error::AlreadyReplied)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        sender
            .send((reply, ack_tx))
            .map_err(|_| Error::ConnectionClosed)?;
        ack_rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}
