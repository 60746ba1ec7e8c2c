//! Gateway server
//!
//! Accept loop, configuration, and the per-connection worker that drives
//! validation, the upgrade handshake, and the streaming loop.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::GatewayConfig;
pub use connection::Connection;
pub use listener::GatewayServer;
