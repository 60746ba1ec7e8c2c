//! WebSocket frame codec
//!
//! Frame layout (RFC 6455 section 5.2):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |           (16/64)             |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |   Masking-key (if MASK)       |          Payload Data         |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! Server frames are sent unmasked; client frames must arrive masked.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Close code: normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code: endpoint going away (idle timeout)
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code: protocol error
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Close code: message too big
pub const CLOSE_TOO_LARGE: u16 = 1009;
/// Close code: unexpected internal condition
pub const CLOSE_INTERNAL: u16 = 1011;

/// Largest control frame payload the protocol allows
const MAX_CONTROL_PAYLOAD: usize = 125;

/// Frame opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    fn from_u8(value: u8) -> Result<Self, FrameError> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(FrameError::ReservedOpCode(other)),
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    /// Whether this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single WebSocket frame
#[derive(Debug, Clone)]
pub struct WsFrame {
    pub fin: bool,
    /// Set by the compression stage on deflated data frames
    pub rsv1: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl WsFrame {
    /// A final binary data frame
    pub fn binary(payload: Bytes) -> Self {
        Self {
            fin: true,
            rsv1: false,
            opcode: OpCode::Binary,
            payload,
        }
    }

    /// A close frame with status code and reason
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(code);
        payload.put_slice(reason.as_bytes());
        Self {
            fin: true,
            rsv1: false,
            opcode: OpCode::Close,
            payload: payload.freeze(),
        }
    }

    /// A pong frame echoing a ping payload
    pub fn pong(payload: Bytes) -> Self {
        Self {
            fin: true,
            rsv1: false,
            opcode: OpCode::Pong,
            payload,
        }
    }

    /// Close status code, when present
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != OpCode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Encode for the server-to-client direction (unmasked)
    pub fn encode(&self) -> Bytes {
        self.encode_inner(None)
    }

    /// Encode for the client-to-server direction with the given mask
    pub fn encode_masked(&self, mask: [u8; 4]) -> Bytes {
        self.encode_inner(Some(mask))
    }

    fn encode_inner(&self, mask: Option<[u8; 4]>) -> Bytes {
        let len = self.payload.len();
        let mut buf = BytesMut::with_capacity(len + 14);

        let mut b0 = self.opcode.to_u8();
        if self.fin {
            b0 |= 0x80;
        }
        if self.rsv1 {
            b0 |= 0x40;
        }
        buf.put_u8(b0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if len < 126 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                for (i, byte) in self.payload.iter().enumerate() {
                    buf.put_u8(byte ^ key[i % 4]);
                }
            }
            None => buf.put_slice(&self.payload),
        }

        buf.freeze()
    }

    /// Try to decode one frame from the buffer
    ///
    /// Returns `Ok(None)` until a full frame is buffered. `require_masked`
    /// enforces the client-to-server masking rule.
    pub fn parse(
        buf: &mut BytesMut,
        max_payload: usize,
        require_masked: bool,
    ) -> Result<Option<WsFrame>, FrameError> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let b0 = buf[0];
        let b1 = buf[1];

        let fin = b0 & 0x80 != 0;
        let rsv1 = b0 & 0x40 != 0;
        let opcode = OpCode::from_u8(b0 & 0x0F)?;
        let masked = b1 & 0x80 != 0;

        if opcode.is_control() && !fin {
            return Err(FrameError::FragmentedControlFrame);
        }
        if require_masked && !masked {
            return Err(FrameError::UnmaskedClientFrame);
        }

        let (payload_len, len_field_size) = match b1 & 0x7F {
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 2)
            }
            127 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut len_bytes = [0u8; 8];
                len_bytes.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len_bytes) as usize, 8)
            }
            n => (n as usize, 0),
        };

        if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlPayloadTooLarge(payload_len));
        }
        if payload_len > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: max_payload,
            });
        }

        let header_len = 2 + len_field_size + if masked { 4 } else { 0 };
        if buf.len() < header_len + payload_len {
            return Ok(None);
        }

        buf.advance(2 + len_field_size);

        let payload = if masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[..4]);
            buf.advance(4);

            let mut payload = buf.split_to(payload_len);
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= key[i % 4];
            }
            payload.freeze()
        } else {
            buf.split_to(payload_len).freeze()
        };

        Ok(Some(WsFrame {
            fin,
            rsv1,
            opcode,
            payload,
        }))
    }
}

/// Close code matching a frame decode failure
pub fn close_code_for(err: &FrameError) -> u16 {
    match err {
        FrameError::PayloadTooLarge { .. } => CLOSE_TOO_LARGE,
        _ => CLOSE_PROTOCOL_ERROR,
    }
}
