//! Application trait and implementations
//!
//! Implement `ClientApp` to react to classified connections.

use async_trait::async_trait;

use crate::connection::{AppChannel, CommandRequest};

/// Trait for applications consuming classified connections
///
/// One callback per interaction mode. Callbacks run on their own task, so a
/// slow handler never stalls classification of other connections.
///
/// # Example
///
/// ```rust,ignore
/// use sse_relay::{async_trait, AppChannel, ClientApp, CommandRequest};
///
/// struct MyApp;
///
/// #[async_trait]
/// impl ClientApp for MyApp {
///     async fn on_app_connect(&self, mut channel: AppChannel) {
///         channel.send_message(format!("hello {}", channel.payload)).await;
///         while let Some(event) = channel.recv().await {
///             // react to events until the peer goes away
///         }
///     }
///
///     async fn on_fire_and_forget(&self, payload: String) {
///         tracing::info!(%payload, "notification received");
///     }
///
///     async fn on_command(&self, request: CommandRequest) {
///         let _ = request.send_success("done").await;
///     }
///
///     fn name(&self) -> &'static str { "MyApp" }
/// }
/// ```
#[async_trait]
pub trait ClientApp: Send + Sync + 'static {
    /// Called when a connection's first event is `appConnect`.
    ///
    /// The channel stays live until this application drops it, calls
    /// `disconnect`, or the peer goes away.
    async fn on_app_connect(&self, channel: AppChannel);

    /// Called when a connection's first event is `fireAndForget`.
    /// The connection is already being closed; only the payload survives.
    async fn on_fire_and_forget(&self, payload: String);

    /// Called when a connection's first event is `oneShotCommand`.
    /// Reply at most once via the request's capabilities.
    async fn on_command(&self, request: CommandRequest);

    /// Called once per connection when it goes away
    fn on_disconnect(&self, _connection_id: &str) {
        // Default: do nothing
    }

    /// Return the application name (for logging)
    fn name(&self) -> &'static str;
}

/// An application that logs and otherwise ignores everything (for testing)
pub struct NoopApp;

#[async_trait]
impl ClientApp for NoopApp {
    async fn on_app_connect(&self, channel: AppChannel) {
        tracing::info!(connection_id = %channel.connection_id, "NoopApp dropping channel");
    }

    async fn on_fire_and_forget(&self, payload: String) {
        tracing::info!(%payload, "NoopApp ignoring notification");
    }

    async fn on_command(&self, request: CommandRequest) {
        let _ = request.send_error("no command handler installed").await;
    }

    fn name(&self) -> &'static str {
        "Noop"
    }
}
