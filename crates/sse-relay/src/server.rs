//! Relay builder and runner

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::{ClientApp, NoopApp};
use crate::router::{Router, RouterEvent};

/// Relay configuration and runner
pub struct Relay<App: ClientApp> {
    host: String,
    port: u16,
    app: App,
}

impl Relay<NoopApp> {
    /// Create a new relay builder
    pub fn builder() -> RelayBuilder {
        RelayBuilder::default()
    }
}

impl<App: ClientApp> Relay<App> {
    /// Run the relay server until Ctrl-C or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let (router, mut notices) = Router::new();
        let app = Arc::new(self.app);

        tracing::info!(
            host = %self.host,
            port = self.port,
            app = app.name(),
            "Starting relay"
        );

        // Dispatch router notifications to the application, one task per
        // notification so a slow handler never blocks the stream.
        let dispatch_app = app.clone();
        let dispatch_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = dispatch_cancel.cancelled() => break,
                    notice = notices.recv() => match notice {
                        Some(RouterEvent::AppConnected(channel)) => {
                            let app = dispatch_app.clone();
                            tokio::spawn(async move { app.on_app_connect(channel).await });
                        }
                        Some(RouterEvent::FireAndForget { payload }) => {
                            let app = dispatch_app.clone();
                            tokio::spawn(async move { app.on_fire_and_forget(payload).await });
                        }
                        Some(RouterEvent::Command(request)) => {
                            let app = dispatch_app.clone();
                            tokio::spawn(async move { app.on_command(request).await });
                        }
                        Some(RouterEvent::Disconnected { connection_id }) => {
                            dispatch_app.on_disconnect(&connection_id);
                        }
                        None => break,
                    }
                }
            }
        });

        let addr: SocketAddr = format!("{}:{}", self.host, self.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection_id = router.attach(stream, Some(peer.to_string()));
                        tracing::debug!(connection_id = %connection_id, peer = %peer, "Accepted connection");
                    }
                    Err(error) => {
                        tracing::warn!(%error, "Accept failed");
                    }
                }
            }
        }

        router.shutdown();
        cancel.cancel();
        tracing::info!("Relay shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Builder for Relay
pub struct RelayBuilder<App = NoopApp> {
    host: String,
    port: u16,
    app: Option<App>,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7000,
            app: None,
        }
    }
}

impl<App> RelayBuilder<App> {
    /// Set the host to bind
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the application
    pub fn app<A: ClientApp>(self, app: A) -> RelayBuilder<A> {
        RelayBuilder {
            host: self.host,
            port: self.port,
            app: Some(app),
        }
    }
}

impl<App: ClientApp> RelayBuilder<App> {
    /// Build the relay
    pub fn build(self) -> anyhow::Result<Relay<App>> {
        let app = self.app.ok_or_else(|| anyhow::anyhow!("App is required"))?;
        Ok(Relay {
            host: self.host,
            port: self.port,
            app,
        })
    }
}
