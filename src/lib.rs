//! # wsflv
//!
//! A WebSocket-FLV live media distribution gateway: accepts web clients
//! over HTTP, upgrades qualifying requests to persistent WebSocket
//! connections, and attaches each client as a subscriber to a named live
//! stream fed by an upstream ingestion path.
//!
//! ```text
//! GET /live/abc123?type=1          ┌────────────────────────────┐
//! ───────────────────────────────► │ validate → handshake →     │
//!                                  │ install pipeline →         │
//!       101 Switching Protocols    │ register subscriber        │
//! ◄─────────────────────────────── └─────────────┬──────────────┘
//!                                                │
//!             ingestion ──publish──► StreamRegistry ──fan-out──►
//!                                                │
//!        binary frames (FLV)        idle → deflate → frame → mux
//! ◄──────────────────────────────────────────────┘
//! ```
//!
//! The registry is an explicitly constructed, shared service: build it
//! once, hand it to the [`GatewayServer`] and to whatever produces media
//! units, and let connection workers manage their own subscriptions.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsflv::{GatewayConfig, GatewayServer, StreamRegistry};
//!
//! #[tokio::main]
//! async fn main() -> wsflv::Result<()> {
//!     let registry = Arc::new(StreamRegistry::new());
//!     let server = GatewayServer::with_registry(GatewayConfig::default(), Arc::clone(&registry));
//!
//!     // The ingestion side publishes into the same registry:
//!     // registry.publish("abc123", wsflv::MediaUnit::video(ts, payload)).await;
//!
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod http;
pub mod media;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod stats;
pub mod subscriber;
pub mod ws;

pub use error::{GatewayError, Result};
pub use media::{MediaKind, MediaUnit};
pub use registry::StreamRegistry;
pub use server::{GatewayConfig, GatewayServer};
pub use stats::GatewayStats;
pub use subscriber::{Subscriber, SubscriberKind};
