//! WebSocket protocol support
//!
//! The server half of RFC 6455: the upgrade handshake and the frame
//! codec. Only what the gateway needs — server frames go out unmasked,
//! client frames come in masked, and inbound traffic is limited to
//! close/ping bookkeeping.

pub mod frame;
pub mod handshake;

pub use frame::{OpCode, WsFrame};
pub use handshake::Handshaker;
