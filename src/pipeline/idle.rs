//! Outbound idle monitoring
//!
//! Closes the connection when no outbound traffic occurs for the
//! configured interval. Inbound traffic is deliberately not counted: a
//! subscriber that receives nothing is as good as gone.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks outbound activity and exposes the idle deadline
pub struct IdleMonitor {
    interval: Duration,
    last_activity: Instant,
}

impl IdleMonitor {
    /// Create a monitor that starts counting now
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_activity: Instant::now(),
        }
    }

    /// Configured idle interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record outbound activity
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Instant at which the connection counts as idle
    pub fn deadline(&self) -> Instant {
        self.last_activity + self.interval
    }

    /// Whether the deadline has passed
    pub fn is_idle(&self) -> bool {
        Instant::now() >= self.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_touch_pushes_deadline() {
        let mut idle = IdleMonitor::new(Duration::from_secs(10));
        let first_deadline = idle.deadline();

        tokio::time::advance(Duration::from_secs(5)).await;
        idle.touch();

        assert!(idle.deadline() > first_deadline);
        assert!(!idle.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_interval() {
        let idle = IdleMonitor::new(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(idle.is_idle());
    }
}
