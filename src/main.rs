mod config;
mod echo;

use sse_relay::Relay;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::echo::EchoApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Relay starting"
    );

    Relay::builder()
        .host(config.server.host)
        .port(config.server.port)
        .app(EchoApp)
        .build()?
        .run()
        .await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=info,sse_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
