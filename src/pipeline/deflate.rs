//! permessage-deflate compression stage
//!
//! Applies raw deflate to data frame payloads when the extension was
//! negotiated. The handshake advertises no context takeover in either
//! direction, so the compressor resets per message. Control frames and
//! empty payloads pass through untouched, as does everything when the
//! extension was not negotiated — the stage is always present in the
//! chain.

use flate2::{Compress, Compression, FlushCompress, Status};

use bytes::Bytes;

use crate::error::PipelineError;
use crate::ws::frame::WsFrame;

/// Trailer a sync flush appends; stripped before framing per RFC 7692
const SYNC_FLUSH_TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Compression stage for the upgraded transport
pub struct Deflate {
    negotiated: bool,
    compressor: Compress,
}

impl Deflate {
    /// Create the stage; `negotiated` reflects the handshake outcome
    pub fn new(negotiated: bool) -> Self {
        Self {
            negotiated,
            compressor: Compress::new(Compression::default(), false),
        }
    }

    /// Whether the extension was negotiated
    pub fn negotiated(&self) -> bool {
        self.negotiated
    }

    /// Compress a frame payload in place, setting RSV1
    pub fn compress(&mut self, frame: &mut WsFrame) -> Result<(), PipelineError> {
        if !self.negotiated || frame.opcode.is_control() || frame.payload.is_empty() {
            return Ok(());
        }

        let mut deflated = self.deflate(&frame.payload)?;

        if deflated.ends_with(&SYNC_FLUSH_TRAILER) {
            deflated.truncate(deflated.len() - SYNC_FLUSH_TRAILER.len());
        }

        frame.payload = Bytes::from(deflated);
        frame.rsv1 = true;

        // No context takeover: fresh dictionary for the next message
        self.compressor.reset();

        Ok(())
    }

    fn deflate(&mut self, data: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let start_in = self.compressor.total_in();
        let mut out = Vec::new();

        loop {
            out.reserve((data.len() / 2).max(1024));

            let consumed = (self.compressor.total_in() - start_in) as usize;
            let status = self
                .compressor
                .compress_vec(&data[consumed..], &mut out, FlushCompress::Sync)
                .map_err(|e| PipelineError::Deflate(e.to_string()))?;

            let all_consumed = (self.compressor.total_in() - start_in) as usize == data.len();
            // A sync flush is complete once deflate stops filling the
            // output buffer
            if all_consumed && out.len() < out.capacity() {
                return Ok(out);
            }
            if status == Status::StreamEnd {
                return Ok(out);
            }
        }
    }
}
