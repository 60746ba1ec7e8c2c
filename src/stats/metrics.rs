//! Gateway-wide counters
//!
//! Shared atomics updated from every connection worker; read via
//! `snapshot`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway-wide statistics
#[derive(Debug, Default)]
pub struct GatewayStats {
    /// Total connections ever accepted
    total_connections: AtomicU64,
    /// Currently open connections
    active_connections: AtomicU64,
    /// Connections that completed the upgrade handshake
    upgraded_connections: AtomicU64,
    /// Currently registered subscribers
    active_subscribers: AtomicU64,
    /// Frames written to clients
    frames_delivered: AtomicU64,
    /// Requests rejected by validation
    rejected_requests: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub upgraded_connections: u64,
    pub active_subscribers: u64,
    pub frames_delivered: u64,
    pub rejected_requests: u64,
}

impl GatewayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_upgraded(&self) {
        self.upgraded_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscriber_attached(&self) {
        self.active_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscriber_detached(&self) {
        self.active_subscribers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frames_delivered(&self, count: u64) {
        self.frames_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn request_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters at once
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            upgraded_connections: self.upgraded_connections.load(Ordering::Relaxed),
            active_subscribers: self.active_subscribers.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
        }
    }
}
