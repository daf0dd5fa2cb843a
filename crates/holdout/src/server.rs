//! `HoldoutServer` builder and server loop.
//!
//! This is the entry point for running a Holdout server. It ties together
//! all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use holdout_protocol::{Codec, JsonCodec};
use holdout_room::{Outbox, RoomManager};
use holdout_session::{Authenticator, ConnectionRegistry};
use holdout_store::Store;
use holdout_transport::{Transport, WebSocketTransport};

use crate::HoldoutError;
use crate::config::{CleanupSettings, ServerConfig, SessionSettings};
use crate::handler::handle_connection;

/// The room manager as wired into the server: events go out through the
/// connection registry.
pub type Rooms<S> = RoomManager<S, ConnectionRegistry<Outbox>>;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: Store, A: Authenticator, C: Codec> {
    pub(crate) rooms: Arc<Rooms<S>>,
    pub(crate) registry: Arc<ConnectionRegistry<Outbox>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) session: SessionSettings,
}

/// Builder for configuring and starting a Holdout server.
///
/// # Example
///
/// ```rust,ignore
/// let server = HoldoutServer::builder()
///     .config(ServerConfig::from_env()?)
///     .build(InMemoryStore::new(), OpaqueTokenAuthenticator::new())
///     .await?;
/// server.run().await
/// ```
pub struct HoldoutServerBuilder {
    config: ServerConfig,
}

impl HoldoutServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bind address. Use port 0 to let the OS pick.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Binds the listener and wires the layers together.
    pub async fn build<S: Store, A: Authenticator>(
        self,
        store: S,
        auth: A,
    ) -> Result<HoldoutServer<S, A, JsonCodec>, HoldoutError> {
        let transport = WebSocketTransport::bind(&self.config.bind)
            .await?
            .with_max_frame(self.config.max_frame_bytes);

        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomManager::new(
            store,
            Arc::clone(&registry),
            self.config.game.clone(),
        ));

        let state = Arc::new(ServerState {
            rooms,
            registry,
            auth,
            codec: JsonCodec,
            session: self.config.session.clone(),
        });

        Ok(HoldoutServer {
            transport,
            state,
            cleanup: self.config.cleanup,
        })
    }
}

impl Default for HoldoutServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Holdout server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HoldoutServer<S: Store, A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, A, C>>,
    cleanup: CleanupSettings,
}

impl<S, A, C> HoldoutServer<S, A, C>
where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    pub fn builder() -> HoldoutServerBuilder {
        HoldoutServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HoldoutError> {
        Ok(self.transport.local_addr()?)
    }

    /// The room manager, for administrative operations such as purging a
    /// room while the server runs.
    pub fn rooms(&self) -> Arc<Rooms<S>> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), HoldoutError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Also drives the periodic sweep of finished rooms.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), HoldoutError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "holdout server running");

        let sweeper = tokio::spawn(sweep_finished_rooms(
            Arc::clone(&self.state.rooms),
            self.cleanup.clone(),
        ));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        sweeper.abort();
        Ok(())
    }
}

async fn sweep_finished_rooms<S: Store>(rooms: Arc<Rooms<S>>, cleanup: CleanupSettings) {
    let mut ticker = tokio::time::interval(cleanup.interval.max(Duration::from_secs(1)));
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = rooms.sweep_finished(cleanup.finished_room_ttl, Utc::now()).await {
            tracing::warn!(error = %e, "finished-room sweep failed");
        }
    }
}
