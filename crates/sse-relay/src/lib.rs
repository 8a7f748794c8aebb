//! # SSE Relay
//!
//! A lightweight SSE-style event channel and connection classification
//! library for Rust.
//!
//! ## Features
//!
//! - **Stream-agnostic**: runs over any duplex byte stream (`TcpStream`, a
//!   TLS session, `tokio::io::duplex` in tests) — no HTTP framing assumed
//! - **Incremental parsing**: events may be split across any number of
//!   partial reads; nothing blocks and nothing buffers the whole stream
//! - **First-event classification**: each connection is routed by its first
//!   event into exactly one interaction mode — long-lived app channel,
//!   fire-and-forget delivery, or one-shot command with a single reply
//! - **Exactly-once teardown**: one disconnect notification per connection,
//!   however many code paths race to drop it
//! - **Built-in server**: optional TCP listener with graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sse_relay::{NoopApp, Relay};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Relay::builder()
//!         .port(7000)
//!         .app(NoopApp)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Wire format
//!
//! Text, newline-delimited, case-sensitive field names:
//!
//! ```text
//! event: <type>            optional; default type = "message"
//! lastEventId: <id>        only on send, when an id is present
//! data: <line>             zero or more, one per logical line
//!                          a blank line terminates the event
//! ```
//!
//! Comment lines begin with `:` and are ignored on parse; the serializer
//! never emits them. Malformed field lines are silently dropped.
//!
//! ## Driving connections by hand
//!
//! The [`Router`] works without the built-in server; attach any duplex
//! stream and consume the notification stream yourself:
//!
//! ```rust,ignore
//! use sse_relay::{Router, RouterEvent};
//!
//! let (router, mut notices) = Router::new();
//! router.attach(stream, None);
//!
//! while let Some(notice) = notices.recv().await {
//!     match notice {
//!         RouterEvent::AppConnected(channel) => { /* long-lived channel */ }
//!         RouterEvent::FireAndForget { payload } => { /* payload only */ }
//!         RouterEvent::Command(request) => {
//!             request.send_success("done").await?;
//!         }
//!         RouterEvent::Disconnected { connection_id } => { /* once each */ }
//!     }
//! }
//! ```

pub mod app;
mod connection;
mod error;
mod event;
mod parser;
mod router;

#[cfg(feature = "server")]
mod server;

// Re-exports
pub use app::{ClientApp, NoopApp};
pub use connection::{AppChannel, CommandRequest, ConnectionMetadata};
pub use error::{Error, Result};
pub use event::{SseEvent, DEFAULT_EVENT_TYPE};
pub use parser::EventParser;
pub use router::{Router, RouterEvent};

#[cfg(feature = "server")]
pub use server::{Relay, RelayBuilder};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
