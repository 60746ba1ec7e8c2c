//! Stream registry for pub/sub fan-out
//!
//! The registry maps stream identifiers to their current subscribers and
//! routes published media units to every subscriber of a stream.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<StreamRegistry>
//!                 ┌──────────────────────────┐
//!                 │ streams: HashMap<String, │
//!                 │   StreamEntry {          │
//!                 │     subscribers: {       │
//!                 │       session -> Arc<Subscriber>
//!                 │     }                    │
//!                 │   }                      │
//!                 └────────────┬─────────────┘
//!                              │
//!      ┌───────────────────────┼───────────────────────┐
//!      │                       │                       │
//!      ▼                       ▼                       ▼
//! [Ingestion]            [Subscriber]            [Subscriber]
//! publish()              queue.recv()            queue.recv()
//!      │                       │                       │
//!      └──► snapshot bucket ──► deliver() ──► connection pipeline
//! ```
//!
//! Fan-out clones a point-in-time snapshot of the bucket under the read
//! lock and delivers outside it, so concurrent subscribe/unsubscribe never
//! tears an iteration and a dead or slow subscriber never blocks the rest.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::StreamEntry;
pub use error::RegistryError;
pub use store::StreamRegistry;
