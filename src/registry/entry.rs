//! Per-stream registry entry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::subscriber::Subscriber;

/// Bucket of subscribers for a single stream
///
/// Membership is keyed by session id; storage order is irrelevant because
/// per-subscriber delivery order is guaranteed by each subscriber's queue.
#[derive(Default)]
pub struct StreamEntry {
    subscribers: HashMap<u64, Arc<Subscriber>>,
    /// Units published to this stream since it was created
    published: AtomicU64,
}

impl StreamEntry {
    /// Create an empty entry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscriber; returns false when the session already holds
    /// one
    pub(super) fn insert(&mut self, subscriber: Arc<Subscriber>) -> bool {
        let session_id = subscriber.session_id();
        if self.subscribers.contains_key(&session_id) {
            return false;
        }
        self.subscribers.insert(session_id, subscriber);
        true
    }

    /// Remove a session's subscriber; returns false when absent
    pub(super) fn remove(&mut self, session_id: u64) -> bool {
        self.subscribers.remove(&session_id).is_some()
    }

    /// Point-in-time snapshot of the bucket for fan-out
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.values().cloned().collect()
    }

    /// Number of subscribers currently in the bucket
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Units published to this stream so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub(super) fn mark_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }
}
