//! Published media unit types
//!
//! A media unit is one unit of published content for a stream, opaque to
//! the gateway core. Units are fanned out to every subscriber of a stream
//! and are designed to be cheap to clone due to `Bytes` reference counting.

use bytes::Bytes;

/// Kind of media carried by a unit, or requested by a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video payloads
    Video,
    /// Audio payloads
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// A single published media unit
///
/// The payload layout is the ingestion collaborator's concern; the gateway
/// only frames it for delivery.
#[derive(Debug, Clone)]
pub struct MediaUnit {
    /// Kind of payload
    pub kind: MediaKind,
    /// Presentation timestamp in milliseconds, zero when the producer
    /// supplies none
    pub timestamp: u32,
    /// Payload data (zero-copy via reference counting)
    pub payload: Bytes,
}

impl MediaUnit {
    /// Create a video unit
    pub fn video(timestamp: u32, payload: Bytes) -> Self {
        Self {
            kind: MediaKind::Video,
            timestamp,
            payload,
        }
    }

    /// Create an audio unit
    pub fn audio(timestamp: u32, payload: Bytes) -> Self {
        Self {
            kind: MediaKind::Audio,
            timestamp,
            payload,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_constructors() {
        let unit = MediaUnit::video(40, Bytes::from_static(&[0x17, 0x01]));
        assert_eq!(unit.kind, MediaKind::Video);
        assert_eq!(unit.timestamp, 40);
        assert_eq!(unit.len(), 2);

        let unit = MediaUnit::audio(0, Bytes::new());
        assert_eq!(unit.kind, MediaKind::Audio);
        assert!(unit.is_empty());
    }

    #[test]
    fn test_clone_shares_payload() {
        let unit = MediaUnit::video(0, Bytes::from(vec![1u8; 1024]));
        let clone = unit.clone();

        // Bytes clones share the same allocation
        assert_eq!(unit.payload.as_ptr(), clone.payload.as_ptr());
    }
}
