//! Media-container muxing stage
//!
//! Terminal transform of the media path: turns raw published media units
//! into transport-ready FLV payloads for one stream. The FLV file header
//! goes out once, in front of the first tag.

use bytes::Bytes;

use crate::media::flv::{self, FlvTag, FlvTagType};
use crate::media::{MediaKind, MediaUnit};
use crate::subscriber::SubscriberKind;

/// FLV muxer bound to a stream id
pub struct FlvMux {
    stream_id: String,
    kind: SubscriberKind,
    header_sent: bool,
    /// Synthetic clock for audio units published without timestamps,
    /// stepped by the subscriber's pacing duration
    clock_ms: f64,
}

impl FlvMux {
    /// Create a muxer for the given stream and subscriber kind
    pub fn new(stream_id: impl Into<String>, kind: SubscriberKind) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind,
            header_sent: false,
            clock_ms: 0.0,
        }
    }

    /// Stream this muxer serves
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Mux one unit into container payloads, in write order
    pub fn mux(&mut self, unit: &MediaUnit) -> Vec<Bytes> {
        let mut out = Vec::with_capacity(2);

        if !self.header_sent {
            let has_video = self.kind.media_kind() == MediaKind::Video;
            // Video streams carry both tracks; audio-only streams don't
            out.push(flv::file_header(true, has_video));
            self.header_sent = true;
        }

        let timestamp = self.timestamp_for(unit);
        let tag = FlvTag {
            tag_type: FlvTagType::from(unit.kind),
            timestamp,
            data: unit.payload.clone(),
        };
        out.push(tag.encode());

        out
    }

    fn timestamp_for(&mut self, unit: &MediaUnit) -> u32 {
        if unit.timestamp != 0 {
            self.clock_ms = unit.timestamp as f64;
            return unit.timestamp;
        }

        // Producer supplied no timestamp; pace audio by the subscriber's
        // window duration
        if let SubscriberKind::Audio { duration } = self.kind {
            if unit.kind == MediaKind::Audio {
                let timestamp = self.clock_ms as u32;
                self.clock_ms += duration * 1000.0;
                return timestamp;
            }
        }

        0
    }
}
