//! Frame codec stage
//!
//! Wraps muxed container payloads into binary WebSocket frames for one
//! stream.

use bytes::Bytes;

use crate::ws::frame::WsFrame;

/// Binary framing bound to a stream id
pub struct FrameCodec {
    stream_id: String,
}

impl FrameCodec {
    /// Create a codec for the given stream
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }

    /// Stream this codec serves
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Wrap one payload into a final binary frame
    pub fn frame(&self, payload: Bytes) -> WsFrame {
        WsFrame::binary(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::frame::OpCode;

    #[test]
    fn test_frames_are_final_binary() {
        let codec = FrameCodec::new("abc123");
        let frame = codec.frame(Bytes::from_static(b"payload"));

        assert_eq!(codec.stream_id(), "abc123");
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(&frame.payload[..], b"payload");
    }
}
