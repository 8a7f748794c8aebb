//! Connection router
//!
//! Owns the registry of live connections. Each attached duplex byte stream
//! gets its own parser and drive task; the task classifies the connection by
//! its first parsed event and then either drops it, holds it open for a
//! single reply, or forwards events both ways until someone hangs up.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::BytesMut;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{AppChannel, CommandRequest, ConnectionMetadata, ReplyEnvelope};
use crate::error::Error;
use crate::event::SseEvent;
use crate::parser::EventParser;

/// Capacity of the per-connection event channels and the notification stream
const CHANNEL_CAPACITY: usize = 100;

/// Initial read buffer capacity
const READ_BUFFER_SIZE: usize = 4096;

/// Notifications emitted by a [`Router`].
///
/// Classification notices carry the handle for their interaction mode;
/// `Disconnected` fires exactly once per attached connection, whichever side
/// ends it first.
#[derive(Debug)]
pub enum RouterEvent {
    /// First event was `appConnect`: a long-lived channel is open
    AppConnected(AppChannel),
    /// First event was `fireAndForget`: payload delivered, connection closed
    FireAndForget {
        /// Payload of the `fireAndForget` event
        payload: String,
    },
    /// First event was `oneShotCommand`: reply exactly once via the request
    Command(CommandRequest),
    /// The connection is gone; emitted once per connection
    Disconnected {
        /// ID of the closed connection
        connection_id: String,
    },
}

struct ConnectionEntry {
    cancel: CancellationToken,
    metadata: ConnectionMetadata,
}

/// Routes freshly attached connections by their first event.
#[derive(Clone)]
pub struct Router {
    /// All live connections: connection_id -> entry
    connections: Arc<DashMap<String, ConnectionEntry>>,
    notices: mpsc::Sender<RouterEvent>,
}

impl Router {
    /// Create a router and the notification stream it feeds
    pub fn new() -> (Self, mpsc::Receiver<RouterEvent>) {
        let (notices, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                connections: Arc::new(DashMap::new()),
                notices,
            },
            receiver,
        )
    }

    /// Attach a duplex byte stream as a new connection.
    ///
    /// Works with any transport exposing readable/writable byte halves:
    /// `TcpStream`, a TLS session, `tokio::io::duplex`, and so on. Returns
    /// the connection ID.
    pub fn attach<S>(&self, stream: S, peer_addr: Option<String>) -> String
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let metadata = ConnectionMetadata::new(peer_addr);
        let cancel = CancellationToken::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionEntry {
                cancel: cancel.clone(),
                metadata: metadata.clone(),
            },
        );
        debug!(connection_id = %connection_id, peer = ?metadata.peer_addr, "connection attached");

        let ctx = DriveContext {
            connection_id: connection_id.clone(),
            metadata,
            cancel,
            notices: self.notices.clone(),
            connections: self.connections.clone(),
        };
        tokio::spawn(drive(stream, ctx));
        connection_id
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// List live connections with their metadata
    pub fn list_connections(&self) -> Vec<(String, ConnectionMetadata)> {
        self.connections
            .iter()
            .map(|e| (e.key().clone(), e.value().metadata.clone()))
            .collect()
    }

    /// Drop a connection by ID. Idempotent; returns `false` if the
    /// connection is already gone.
    pub fn drop_connection(&self, connection_id: &str) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every live connection
    pub fn shutdown(&self) {
        for entry in self.connections.iter() {
            entry.cancel.cancel();
        }
    }
}

struct DriveContext {
    connection_id: String,
    metadata: ConnectionMetadata,
    cancel: CancellationToken,
    notices: mpsc::Sender<RouterEvent>,
    connections: Arc<DashMap<String, ConnectionEntry>>,
}

/// One read step: events completed by the next chunk, end of stream with an
/// optional flushed final event, or a transport error.
enum Read {
    Chunk(Vec<SseEvent>),
    Closed(Option<SseEvent>),
    Failed(std::io::Error),
}

async fn read_events<R>(reader: &mut R, parser: &mut EventParser, buf: &mut BytesMut) -> Read
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    match reader.read_buf(buf).await {
        Ok(0) => Read::Closed(parser.finish()),
        Ok(_) => Read::Chunk(parser.feed(buf)),
        Err(error) => Read::Failed(error),
    }
}

async fn drive<S>(stream: S, ctx: DriveContext)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut parser = EventParser::new();
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut backlog = VecDeque::new();

    let first = await_first_event(&mut reader, &mut parser, &mut buf, &mut backlog, &ctx.cancel).await;

    if let Some(SseEvent {
        event_type, data, ..
    }) = first
    {
        match event_type.as_str() {
            "appConnect" => {
                established(data, backlog, &mut reader, &mut writer, &mut parser, &mut buf, &ctx)
                    .await;
            }
            "fireAndForget" => {
                info!(connection_id = %ctx.connection_id, "fire-and-forget delivery");
                let _ = ctx
                    .notices
                    .send(RouterEvent::FireAndForget { payload: data })
                    .await;
            }
            "oneShotCommand" => {
                await_reply(data, &mut reader, &mut writer, &mut parser, &mut buf, &ctx).await;
            }
            other => {
                warn!(
                    connection_id = %ctx.connection_id,
                    event_type = %other,
                    "unrecognized first event, dropping connection"
                );
            }
        }
    }

    // Closing an already-closed sink is a no-op.
    let _ = writer.shutdown().await;

    if ctx.connections.remove(&ctx.connection_id).is_some() {
        debug!(connection_id = %ctx.connection_id, "connection closed");
        let _ = ctx
            .notices
            .send(RouterEvent::Disconnected {
                connection_id: ctx.connection_id.clone(),
            })
            .await;
    }
}

/// Wait for the first parsed event. Events completed by the same chunk are
/// queued on `backlog` so they are not lost to classification.
async fn await_first_event<R>(
    reader: &mut R,
    parser: &mut EventParser,
    buf: &mut BytesMut,
    backlog: &mut VecDeque<SseEvent>,
    cancel: &CancellationToken,
) -> Option<SseEvent>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(event) = backlog.pop_front() {
            return Some(event);
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            read = read_events(reader, parser, buf) => match read {
                Read::Chunk(events) => backlog.extend(events),
                Read::Closed(last) => return last,
                Read::Failed(error) => {
                    debug!(%error, "transport error before first event");
                    return None;
                }
            }
        }
    }
}

/// Long-lived mode: forward inbound events to the application and write
/// outbound events to the peer until either side ends the connection.
async fn established<R, W>(
    payload: String,
    backlog: VecDeque<SseEvent>,
    reader: &mut R,
    writer: &mut W,
    parser: &mut EventParser,
    buf: &mut BytesMut,
    ctx: &DriveContext,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (out_tx, mut out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let channel = AppChannel::new(
        ctx.connection_id.clone(),
        payload,
        ctx.metadata.clone(),
        out_tx,
        in_rx,
        ctx.cancel.clone(),
    );

    info!(connection_id = %ctx.connection_id, "application channel established");
    if ctx
        .notices
        .send(RouterEvent::AppConnected(channel))
        .await
        .is_err()
    {
        return;
    }

    // Events that arrived in the same chunk as the opening event.
    for event in backlog {
        let _ = in_tx.send(event).await;
    }

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            outbound = out_rx.recv() => match outbound {
                Some(event) => {
                    if let Err(error) = writer.write_all(event.to_wire().as_bytes()).await {
                        debug!(connection_id = %ctx.connection_id, %error, "write failed");
                        break;
                    }
                }
                // Handle dropped by the application.
                None => break,
            },
            read = read_events(reader, parser, buf) => match read {
                Read::Chunk(events) => {
                    for event in events {
                        let _ = in_tx.send(event).await;
                    }
                }
                Read::Closed(last) => {
                    if let Some(event) = last {
                        let _ = in_tx.send(event).await;
                    }
                    break;
                }
                Read::Failed(error) => {
                    debug!(connection_id = %ctx.connection_id, %error, "transport error");
                    break;
                }
            }
        }
    }
}

/// One-shot mode: hold the connection open until the application replies,
/// the peer hangs up, or the connection is dropped.
async fn await_reply<R, W>(
    payload: String,
    reader: &mut R,
    writer: &mut W,
    parser: &mut EventParser,
    buf: &mut BytesMut,
    ctx: &DriveContext,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (reply_tx, mut reply_rx) = oneshot::channel::<ReplyEnvelope>();
    let request = CommandRequest::new(
        ctx.connection_id.clone(),
        payload,
        ctx.metadata.clone(),
        reply_tx,
    );

    info!(connection_id = %ctx.connection_id, "one-shot command received");
    if ctx
        .notices
        .send(RouterEvent::Command(request))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            envelope = &mut reply_rx => {
                if let Ok((reply, ack)) = envelope {
                    let event = reply.into_event();
                    let outcome = write_reply(writer, &event).await;
                    let _ = ack.send(outcome.map_err(Error::Io));
                }
                // Err means the request was dropped without a reply; either
                // way the connection is done.
                break;
            }
            read = read_events(reader, parser, buf) => match read {
                // Events after the first are not meaningful in this mode.
                Read::Chunk(_) => {}
                Read::Closed(_) => break,
                Read::Failed(_) => break,
            }
        }
    }
}

async fn write_reply<W>(writer: &mut W, event: &SseEvent) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(event.to_wire().as_bytes()).await?;
    writer.shutdown().await
}
