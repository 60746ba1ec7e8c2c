//! Shared terminal error stage
//!
//! One instance per gateway, cloned into every connection's chain as the
//! last stage so it observes failures propagated from any earlier stage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::ws::frame::{WsFrame, CLOSE_INTERNAL};

/// Terminal failure observer shared across all connections
#[derive(Clone)]
pub struct ErrorStage {
    inner: Arc<Inner>,
}

struct Inner {
    errors: AtomicU64,
}

impl ErrorStage {
    /// Create the gateway's shared instance
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                errors: AtomicU64::new(0),
            }),
        }
    }

    /// Record a chain failure and produce the close frame to send
    pub fn observe(&self, session_id: u64, err: &PipelineError) -> WsFrame {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            session_id = session_id,
            error = %err,
            "Pipeline failure"
        );
        WsFrame::close(CLOSE_INTERNAL, "internal error")
    }

    /// Failures observed since the gateway started
    pub fn error_count(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }
}

impl Default for ErrorStage {
    fn default() -> Self {
        Self::new()
    }
}
