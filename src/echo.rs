//! Demo application: echoes what connected peers send
//!
//! Long-lived channels get a greeting and then an echo of every event;
//! one-shot commands are acknowledged with their own payload; fire-and-forget
//! payloads are only logged.

use async_trait::async_trait;
use sse_relay::{AppChannel, ClientApp, CommandRequest, SseEvent};

pub struct EchoApp;

#[async_trait]
impl ClientApp for EchoApp {
    async fn on_app_connect(&self, mut channel: AppChannel) {
        tracing::info!(
            connection_id = %channel.connection_id,
            payload = %channel.payload,
            "application connected"
        );
        channel.send_message(format!("connected: {}", channel.payload)).await;

        while let Some(event) = channel.recv().await {
            tracing::debug!(
                connection_id = %channel.connection_id,
                event_type = %event.event_type,
                "echoing event"
            );
            if !channel.send(SseEvent::new(event.event_type, event.data)).await {
                break;
            }
        }
        tracing::info!(connection_id = %channel.connection_id, "application channel ended");
    }

    async fn on_fire_and_forget(&self, payload: String) {
        tracing::info!(%payload, "fire-and-forget received");
    }

    async fn on_command(&self, request: CommandRequest) {
        let ack = format!("ok: {}", request.payload);
        if let Err(error) = request.send_success(ack).await {
            tracing::warn!(connection_id = %request.connection_id, %error, "reply not delivered");
        }
    }

    fn on_disconnect(&self, connection_id: &str) {
        tracing::debug!(connection_id, "peer disconnected");
    }

    fn name(&self) -> &'static str {
        "Echo"
    }
}
