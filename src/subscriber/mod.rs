//! Subscriber model
//!
//! A subscriber is one client's attachment to a named live stream. It is
//! created only after a successful handshake and registered in the stream
//! registry for the lifetime of its connection.
//!
//! The subscriber never owns the socket: delivery goes through an
//! unbounded channel whose receiver lives in the connection task, so a
//! closed connection simply makes delivery fail for that subscriber.
//!
//! Attachment follows a small state machine that resolves the race between
//! the asynchronous handshake-completion continuation and connection
//! teardown:
//!
//! ```text
//! Pending ──try_attach──► Attached ──detach──► Detached
//!    └───────────────detach (teardown won)──────────┘
//! ```
//!
//! Registration consults `try_attach` first, so a connection that closed
//! before the continuation ran leaves no registry residue.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::media::{MediaKind, MediaUnit};
use crate::registry::StreamRegistry;

/// Subscriber variant, tagged with the variant-specific payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubscriberKind {
    /// Forwards every published unit unmodified in arrival order
    Video,
    /// Same delivery contract; `duration` parameterizes the muxing
    /// stage's pacing window in seconds
    Audio { duration: f64 },
}

impl SubscriberKind {
    /// The media kind this subscriber was requested with
    pub fn media_kind(&self) -> MediaKind {
        match self {
            SubscriberKind::Video => MediaKind::Video,
            SubscriberKind::Audio { .. } => MediaKind::Audio,
        }
    }

    /// Pacing duration in seconds, audio only
    pub fn duration(&self) -> Option<f64> {
        match self {
            SubscriberKind::Video => None,
            SubscriberKind::Audio { duration } => Some(*duration),
        }
    }
}

/// Attachment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// Created, handshake completion not yet observed
    Pending,
    /// Registered in the stream registry
    Attached,
    /// Removed, or closed before attachment; terminal
    Detached,
}

const STATE_PENDING: u8 = 0;
const STATE_ATTACHED: u8 = 1;
const STATE_DETACHED: u8 = 2;

impl AttachState {
    fn from_u8(v: u8) -> Self {
        match v {
            STATE_PENDING => AttachState::Pending,
            STATE_ATTACHED => AttachState::Attached,
            _ => AttachState::Detached,
        }
    }
}

/// A client attachment to one stream
pub struct Subscriber {
    session_id: u64,
    stream_id: String,
    kind: SubscriberKind,
    sender: mpsc::UnboundedSender<MediaUnit>,
    state: AtomicU8,
}

impl Subscriber {
    /// Create a subscriber and the delivery channel its connection will
    /// drain
    pub fn channel(
        session_id: u64,
        stream_id: String,
        kind: SubscriberKind,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MediaUnit>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let subscriber = Arc::new(Self {
            session_id,
            stream_id,
            kind,
            sender: tx,
            state: AtomicU8::new(STATE_PENDING),
        });

        (subscriber, rx)
    }

    /// Session id of the owning connection
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Stream this subscriber is attached to
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Subscriber variant
    pub fn kind(&self) -> SubscriberKind {
        self.kind
    }

    /// Pacing duration in seconds, audio only
    pub fn duration(&self) -> Option<f64> {
        self.kind.duration()
    }

    /// Current attachment state
    pub fn state(&self) -> AttachState {
        AttachState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the subscriber is currently registered
    pub fn is_attached(&self) -> bool {
        self.state() == AttachState::Attached
    }

    /// Transition `Pending -> Attached`; called by the registry under its
    /// lock so attachment and insertion are atomic with respect to
    /// teardown. Returns false when teardown already won the race.
    pub(crate) fn try_attach(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_PENDING,
                STATE_ATTACHED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Deliver one unit into the connection's queue
    ///
    /// Returns false once the connection side of the channel is gone.
    pub(crate) fn deliver(&self, unit: MediaUnit) -> bool {
        self.sender.send(unit).is_ok()
    }

    /// Detach from the registry
    ///
    /// Idempotent: the first call from any path wins, later calls are
    /// no-ops. A subscriber that was never attached only transitions its
    /// state so a late attach cannot succeed.
    pub async fn detach(&self, registry: &StreamRegistry) {
        let prev = self.state.swap(STATE_DETACHED, Ordering::AcqRel);
        if prev == STATE_ATTACHED {
            registry.unsubscribe(&self.stream_id, self.session_id).await;
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("session_id", &self.session_id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
