//! Stream registry implementation
//!
//! The central registry that manages all active streams and routes media
//! units from the ingestion path to subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::StreamEntry;
use super::error::RegistryError;
use crate::media::MediaUnit;
use crate::subscriber::Subscriber;

/// Central registry for all active streams
///
/// Thread-safe via `RwLock`. The publish path is read-heavy: fan-out takes
/// the read lock only long enough to snapshot the bucket.
pub struct StreamRegistry {
    /// Map of stream id to subscriber bucket
    streams: RwLock<HashMap<String, StreamEntry>>,
}

impl StreamRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber in its stream's bucket
    ///
    /// Attachment goes through the subscriber's state machine first, so a
    /// connection that closed before this ran is rejected and leaves no
    /// residue. Idempotent per connection: a session that already holds a
    /// registered subscriber is not double-registered.
    pub async fn subscribe(&self, subscriber: Arc<Subscriber>) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;

        if subscriber.is_attached() {
            // Already registered by this connection
            tracing::debug!(
                session_id = subscriber.session_id(),
                stream = %subscriber.stream_id(),
                "Subscribe ignored: already attached"
            );
            return Ok(());
        }

        if !subscriber.try_attach() {
            return Err(RegistryError::ConnectionClosed {
                stream_id: subscriber.stream_id().to_string(),
                session_id: subscriber.session_id(),
            });
        }

        let stream_id = subscriber.stream_id().to_string();
        let session_id = subscriber.session_id();
        let kind = subscriber.kind();

        let entry = streams.entry(stream_id.clone()).or_default();
        entry.insert(subscriber);

        tracing::info!(
            stream = %stream_id,
            session_id = session_id,
            kind = ?kind,
            subscribers = entry.len(),
            "Subscriber added"
        );

        Ok(())
    }

    /// Remove a session's subscriber from a stream's bucket
    ///
    /// Safe to call for an already-removed subscriber; empty buckets are
    /// dropped.
    pub async fn unsubscribe(&self, stream_id: &str, session_id: u64) -> bool {
        let mut streams = self.streams.write().await;

        let Some(entry) = streams.get_mut(stream_id) else {
            return false;
        };

        let removed = entry.remove(session_id);
        if removed {
            tracing::debug!(
                stream = %stream_id,
                session_id = session_id,
                subscribers = entry.len(),
                "Subscriber removed"
            );
        }

        if entry.is_empty() {
            streams.remove(stream_id);
        }

        removed
    }

    /// Deliver a media unit to every subscriber of a stream
    ///
    /// Fan-out iterates a point-in-time snapshot of the bucket; delivery
    /// failure for one subscriber (a closed connection) does not affect
    /// the others. Returns the number of subscribers delivered to.
    pub async fn publish(&self, stream_id: &str, unit: MediaUnit) -> usize {
        let snapshot = {
            let streams = self.streams.read().await;
            let Some(entry) = streams.get(stream_id) else {
                return 0;
            };
            entry.mark_published();
            entry.snapshot()
        };

        let mut delivered = 0;
        for subscriber in &snapshot {
            if subscriber.deliver(unit.clone()) {
                delivered += 1;
            } else {
                tracing::trace!(
                    stream = %stream_id,
                    session_id = subscriber.session_id(),
                    "Delivery skipped: connection gone"
                );
            }
        }

        delivered
    }

    /// Number of subscribers currently attached to a stream
    pub async fn subscriber_count(&self, stream_id: &str) -> usize {
        let streams = self.streams.read().await;
        streams.get(stream_id).map(|e| e.len()).unwrap_or(0)
    }

    /// Snapshot of a stream's subscribers
    pub async fn subscribers(&self, stream_id: &str) -> Vec<Arc<Subscriber>> {
        let streams = self.streams.read().await;
        streams
            .get(stream_id)
            .map(|e| e.snapshot())
            .unwrap_or_default()
    }

    /// Number of streams with at least one subscriber
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
