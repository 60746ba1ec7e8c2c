//! Gateway error types
//!
//! Each subsystem has a focused error enum; `GatewayError` ties them
//! together for the server surface. Validation failures are not errors:
//! they resolve to terminal HTTP responses and never reach this module.

use crate::registry::RegistryError;

/// Convenience result alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error type for HTTP request-head decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Request head exceeded the configured limit before terminating
    RequestTooLarge(usize),
    /// Request line did not have the `METHOD SP URI SP VERSION` shape
    InvalidRequestLine,
    /// A header line had no name or no colon separator
    InvalidHeader,
    /// Request head was not valid UTF-8
    InvalidEncoding,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::RequestTooLarge(limit) => {
                write!(f, "request head exceeds {} bytes", limit)
            }
            HttpError::InvalidRequestLine => write!(f, "invalid request line"),
            HttpError::InvalidHeader => write!(f, "invalid header line"),
            HttpError::InvalidEncoding => write!(f, "request head is not valid UTF-8"),
        }
    }
}

impl std::error::Error for HttpError {}

/// Error type for the protocol-upgrade handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Client requested a handshake version other than 13
    UnsupportedVersion(String),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeError::UnsupportedVersion(v) => {
                write!(f, "unsupported handshake version: {}", v)
            }
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Error type for WebSocket frame decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame payload exceeds the configured maximum
    PayloadTooLarge { size: usize, max: usize },
    /// Control frame payload exceeds the 125-byte protocol limit
    ControlPayloadTooLarge(usize),
    /// Control frames must not be fragmented
    FragmentedControlFrame,
    /// Opcode is reserved by the protocol
    ReservedOpCode(u8),
    /// Client frames must be masked
    UnmaskedClientFrame,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::PayloadTooLarge { size, max } => {
                write!(f, "frame payload of {} bytes exceeds maximum {}", size, max)
            }
            FrameError::ControlPayloadTooLarge(size) => {
                write!(f, "control frame payload of {} bytes exceeds 125", size)
            }
            FrameError::FragmentedControlFrame => write!(f, "fragmented control frame"),
            FrameError::ReservedOpCode(op) => write!(f, "reserved opcode: {:#x}", op),
            FrameError::UnmaskedClientFrame => write!(f, "client frame is not masked"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Error type for the per-connection processing chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The compression stage failed to deflate a frame payload
    Deflate(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Deflate(msg) => write!(f, "deflate failure: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Top-level gateway error
#[derive(Debug)]
pub enum GatewayError {
    /// I/O error on the underlying connection
    Io(std::io::Error),
    /// Request head decoding failure
    Http(HttpError),
    /// Protocol-upgrade handshake failure
    Handshake(HandshakeError),
    /// WebSocket frame decoding failure
    Frame(FrameError),
    /// Processing-chain failure
    Pipeline(PipelineError),
    /// Registry operation failure
    Registry(RegistryError),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Io(e) => write!(f, "io error: {}", e),
            GatewayError::Http(e) => write!(f, "http error: {}", e),
            GatewayError::Handshake(e) => write!(f, "handshake error: {}", e),
            GatewayError::Frame(e) => write!(f, "frame error: {}", e),
            GatewayError::Pipeline(e) => write!(f, "pipeline error: {}", e),
            GatewayError::Registry(e) => write!(f, "registry error: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Io(e) => Some(e),
            GatewayError::Http(e) => Some(e),
            GatewayError::Handshake(e) => Some(e),
            GatewayError::Frame(e) => Some(e),
            GatewayError::Pipeline(e) => Some(e),
            GatewayError::Registry(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(e)
    }
}

impl From<HttpError> for GatewayError {
    fn from(e: HttpError) -> Self {
        GatewayError::Http(e)
    }
}

impl From<HandshakeError> for GatewayError {
    fn from(e: HandshakeError) -> Self {
        GatewayError::Handshake(e)
    }
}

impl From<FrameError> for GatewayError {
    fn from(e: FrameError) -> Self {
        GatewayError::Frame(e)
    }
}

impl From<PipelineError> for GatewayError {
    fn from(e: PipelineError) -> Self {
        GatewayError::Pipeline(e)
    }
}

impl From<RegistryError> for GatewayError {
    fn from(e: RegistryError) -> Self {
        GatewayError::Registry(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_cause() {
        let err: GatewayError = HandshakeError::UnsupportedVersion("8".to_string()).into();
        assert!(err.to_string().contains("unsupported handshake version: 8"));

        let err: GatewayError = FrameError::PayloadTooLarge {
            size: 10,
            max: 5,
        }
        .into();
        assert!(err.to_string().contains("exceeds maximum 5"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err: GatewayError = HttpError::InvalidRequestLine.into();
        assert!(err.source().is_some());
    }
}
