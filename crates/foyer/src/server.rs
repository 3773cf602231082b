//! `FoyerServer` builder and accept loop.
//!
//! This is the entry point for running a chat server. It ties the layers
//! together: transport → protocol → auth → rooms.

use std::sync::{Arc, Weak};
use std::time::Duration;

use foyer_auth::{Authenticator, TokenValidationCache};
use foyer_protocol::JsonCodec;
use foyer_room::{RoomConfig, RoomDirectory};
use foyer_transport::{TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{ClientRegistry, FoyerError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// The registry, the directory and the cache each sit behind their own
/// lock. Handlers never hold two of them at once.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) clients: Arc<ClientRegistry>,
    pub(crate) rooms: Arc<RoomDirectory>,
    pub(crate) cache: TokenValidationCache<A>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Foyer server.
///
/// # Example
///
/// ```rust,ignore
/// use foyer::prelude::*;
///
/// let server = FoyerServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .default_rooms(["General", "Random"])
///     .build(authority)
///     .await?;
/// server.run().await
/// ```
pub struct FoyerServerBuilder {
    config: ServerConfig,
}

impl FoyerServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
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

    /// Sets the largest envelope a client may send.
    pub fn max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.config.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Sets how long a successful token check is trusted.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Sets the rooms that exist at startup.
    pub fn default_rooms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.default_rooms = names.into_iter().map(Into::into).collect();
        self
    }

    /// Binds the newline-framed TCP listener and builds the server.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<FoyerServer<TcpTransport, A>, FoyerError> {
        let transport = TcpTransport::bind(&self.config.bind_addr)
            .await
            .map_err(FoyerError::Bind)?
            .with_max_frame_bytes(self.config.max_frame_bytes);
        self.build_with_transport(transport, auth).await
    }

    /// Builds the server on an already-bound transport, e.g. a
    /// [`WebSocketTransport`](foyer_transport::WebSocketTransport).
    pub async fn build_with_transport<T: Transport, A: Authenticator>(
        self,
        transport: T,
        auth: A,
    ) -> Result<FoyerServer<T, A>, FoyerError> {
        let rooms =
            RoomDirectory::with_rooms(self.config.room.clone(), &self.config.default_rooms)
                .await?;

        let state = Arc::new(ServerState {
            clients: Arc::new(ClientRegistry::new()),
            rooms: Arc::new(rooms),
            cache: TokenValidationCache::new(auth, self.config.cache_ttl),
            codec: JsonCodec,
        });

        Ok(FoyerServer {
            transport,
            config: self.config,
            state,
        })
    }
}

impl Default for FoyerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A chat server bound to its listener.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FoyerServer<T: Transport, A: Authenticator> {
    transport: T,
    config: ServerConfig,
    state: Arc<ServerState<A>>,
}

impl<T: Transport, A: Authenticator> FoyerServer<T, A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle to the registry of authenticated clients.
    pub fn clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.state.clients)
    }

    /// Handle to the room directory.
    pub fn rooms(&self) -> Arc<RoomDirectory> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per accepted connection and a background
    /// sweep of stale cache entries. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), FoyerError> {
        tracing::info!(addr = %self.config.bind_addr, "foyer server running");
        tokio::spawn(purge_cache(
            Arc::downgrade(&self.state),
            self.config.cache_ttl,
        ));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Drops stale cache entries every `every` until the server goes away.
async fn purge_cache<A: Authenticator>(state: Weak<ServerState<A>>, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            break;
        };
        let purged = state.cache.purge_stale().await;
        if purged > 0 {
            tracing::debug!(purged, "stale token cache entries dropped");
        }
    }
}
