//! Gateway configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Gateway configuration options
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path prefix all stream URLs must start with; the stream id is the
    /// remainder of the path
    pub stream_root: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Close the connection when no outbound traffic occurs for this long
    pub idle_interval: Duration,

    /// The upgrade request must arrive within this time
    pub request_timeout: Duration,

    /// Maximum request head size
    pub max_request_size: usize,

    /// Maximum WebSocket frame payload accepted from clients
    pub max_frame_size: usize,

    /// Offer permessage-deflate to clients that ask for it
    pub compression: bool,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            stream_root: "/live/".to_string(),
            max_connections: 0, // Unlimited
            idle_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            max_request_size: 16 * 1024,
            max_frame_size: 5 * 1024 * 1024, // 5MB
            compression: true,
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl GatewayConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the stream-root prefix
    pub fn stream_root(mut self, root: impl Into<String>) -> Self {
        self.stream_root = root.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the outbound idle interval
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Set the upgrade request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum client frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Disable permessage-deflate negotiation
    pub fn disable_compression(mut self) -> Self {
        self.compression = false;
        self
    }
}
