//! Gateway listener
//!
//! Handles the TCP accept loop and spawns connection workers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::pipeline::ErrorStage;
use crate::registry::StreamRegistry;
use crate::server::config::GatewayConfig;
use crate::server::connection::Connection;
use crate::stats::GatewayStats;

/// WebSocket-FLV distribution gateway
pub struct GatewayServer {
    config: GatewayConfig,
    registry: Arc<StreamRegistry>,
    stats: Arc<GatewayStats>,
    error_stage: ErrorStage,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl GatewayServer {
    /// Create a new gateway with its own registry
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_registry(config, Arc::new(StreamRegistry::new()))
    }

    /// Create a new gateway over an externally constructed registry
    ///
    /// The registry is shared with the ingestion path, which publishes
    /// media units into it.
    pub fn with_registry(config: GatewayConfig, registry: Arc<StreamRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            stats: Arc::new(GatewayStats::new()),
            error_stage: ErrorStage::new(),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get a reference to the gateway statistics
    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the gateway
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Gateway listening");

        self.accept_loop(&listener).await
    }

    /// Run the gateway with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Gateway listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let error_stage = self.error_stage.clone();

        stats.connection_opened();

        tokio::spawn(async move {
            let _permit = permit;

            let connection = Connection::new(
                session_id, socket, peer_addr, config, registry, error_stage,
                Arc::clone(&stats),
            );

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }
}
