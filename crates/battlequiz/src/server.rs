//! `BattleQuizServer` builder and server loop.
//!
//! This is the entry point for running a battle server. It ties together
//! all the layers: transport → protocol → pool → room.

use std::sync::Arc;
use std::time::Duration;

use battlequiz_pool::QuestionCatalog;
use battlequiz_protocol::{Codec, JsonCodec};
use battlequiz_room::{EngineConfig, RoomManager};
use battlequiz_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{BattleQuizError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) catalog: Arc<QuestionCatalog>,
    pub(crate) codec: C,
    pub(crate) ping_interval: Duration,
    pub(crate) peer_timeout: Duration,
}

/// Builder for configuring and starting a battle server.
///
/// # Example
///
/// ```rust,ignore
/// use battlequiz::prelude::*;
///
/// let server = BattleQuizServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(catalog)
///     .await?;
/// server.run().await
/// ```
pub struct BattleQuizServerBuilder {
    bind_addr: String,
    engine: EngineConfig,
    ping_interval: Duration,
    peer_timeout: Duration,
}

impl BattleQuizServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from a loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.listen_addr.clone(),
            engine: config.engine.clone(),
            ping_interval: config.limits.ping_interval(),
            peer_timeout: config.limits.peer_timeout(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the engine timings shared by every room.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets how often every connection is pinged.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets how long a peer may go without answering before it is dropped.
    pub fn peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server around `catalog`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(
        self,
        catalog: Arc<QuestionCatalog>,
    ) -> Result<BattleQuizServer<JsonCodec>, BattleQuizError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.engine, Arc::clone(&catalog))),
            catalog,
            codec: JsonCodec,
            ping_interval: self.ping_interval,
            peer_timeout: self.peer_timeout,
        });

        Ok(BattleQuizServer { transport, state })
    }
}

impl Default for BattleQuizServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running battle server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BattleQuizServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl BattleQuizServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> BattleQuizServerBuilder {
        BattleQuizServerBuilder::new()
    }
}

impl<C: Codec> BattleQuizServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), BattleQuizError> {
        tracing::info!(
            addr = ?self.local_addr().ok(),
            questions = self.state.catalog.len(),
            "battle server running"
        );

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
