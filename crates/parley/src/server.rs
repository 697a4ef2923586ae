//! `ParleyServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → presence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, JsonCodec};
use parley_session::{SessionConfig, SessionManager};
use parley_transport::{
    DEFAULT_HANDSHAKE_TIMEOUT, Transport, TransportError, WebSocketTransport,
};

use crate::ParleyError;
use crate::handler::serve;

/// Default listen address. Matches the port browser clients expect.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";

/// Pause after a failed accept so a persistent error (out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: SessionManager,
    pub(crate) codec: C,
    pub(crate) notify_errors: bool,
}

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Send an `error` event back when a request is rejected or a
    /// message is dropped. Off by default: the relay is silent.
    pub notify_errors: bool,

    /// How long a client may take to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// Per-connection session settings.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            notify_errors: false,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            session: SessionConfig::default(),
        }
    }
}

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn start() -> Result<(), ParleyError> {
/// let server = ParleyServer::<JsonCodec>::builder()
///     .bind("0.0.0.0:3001")
///     .notify_errors(true)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParleyServerBuilder {
    config: ServerConfig,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Sets the WebSocket upgrade deadline.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Enables or disables `error` acknowledgments.
    pub fn notify_errors(mut self, enabled: bool) -> Self {
        self.config.notify_errors = enabled;
        self
    }

    /// Binds the listener and returns a server ready to [`run`].
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// [`run`]: ParleyServer::run
    pub async fn build(self) -> Result<ParleyServer<JsonCodec>, ParleyError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);

        let state = Arc::new(ServerState {
            sessions: SessionManager::new(self.config.session),
            codec: JsonCodec,
            notify_errors: self.config.notify_errors,
        });

        Ok(ParleyServer { transport, state })
    }
}

/// A bound Parley server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParleyServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> ParleyServer<C> {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted client gets its own task, which also performs the
    /// WebSocket upgrade, so a client that never finishes it holds up
    /// nobody else. A failed accept is logged and retried after a short
    /// pause. Connection tasks that are already running are left to
    /// finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ParleyError> {
        tracing::info!("Parley relay running");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => accepted,
            };

            match accepted {
                Ok(pending) => {
                    tokio::spawn(serve(pending, Arc::clone(&self.state)));
                }
                Err(TransportError::Shutdown) => break,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    if let Some(delay) = accept_backoff(&e) {
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.transport.shutdown().await?;
        tracing::info!("Parley relay stopped");
        Ok(())
    }
}

/// How long to wait before accepting again after `err`.
fn accept_backoff(err: &TransportError) -> Option<Duration> {
    match err {
        TransportError::AcceptFailed(_) => Some(ACCEPT_BACKOFF),
        _ => None,
    }
}
