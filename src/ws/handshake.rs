//! WebSocket server handshake
//!
//! The upgrade exchange that converts a request/response connection into
//! a persistent bidirectional one:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |---- GET + Upgrade + Key + Version ---->|
//!   |                                        |
//!   |<--- 101 + Sec-WebSocket-Accept --------|   (version 13)
//!   |<--- 426 + Sec-WebSocket-Version -------|   (anything else)
//!   |                                        |
//!   |        [Connection is streaming]        |
//! ```
//!
//! Completion is the flush of the 101 response; subscriber registration
//! happens in the caller's continuation after a successful flush.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;
use crate::http::response::HttpResponse;
use crate::http::validate::StreamRequest;

/// GUID appended to the client key when computing the accept digest,
/// fixed by RFC 6455
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only handshake version this gateway speaks
pub const SUPPORTED_VERSION: &str = "13";

/// Negotiator for one validated upgrade request
#[derive(Debug)]
pub struct Handshaker {
    location: String,
    accept: String,
    compression: bool,
}

impl Handshaker {
    /// Match the request to a supported upgrade version
    ///
    /// Returns the unsupported-version error when the client asked for
    /// anything but version 13; the caller sends the dedicated signal and
    /// takes no further action.
    pub fn new(request: &StreamRequest, compression_enabled: bool) -> Result<Self, HandshakeError> {
        if request.version != SUPPORTED_VERSION {
            return Err(HandshakeError::UnsupportedVersion(request.version.clone()));
        }

        Ok(Self {
            location: format!("ws://{}{}", request.host, request.path),
            accept: accept_key(&request.key),
            compression: compression_enabled && request.compression_offered,
        })
    }

    /// Upgrade target location built from host + original request path
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Whether permessage-deflate was negotiated
    pub fn compression(&self) -> bool {
        self.compression
    }

    /// The 101 Switching Protocols response completing the handshake
    pub fn switching_protocols(&self) -> HttpResponse {
        let mut response = HttpResponse::new(101)
            .with_header("upgrade", "websocket")
            .with_header("connection", "upgrade")
            .with_header("sec-websocket-accept", self.accept.clone());

        if self.compression {
            // No context takeover in either direction: the compression
            // stage resets its dictionary per message
            response = response.with_header(
                "sec-websocket-extensions",
                "permessage-deflate; server_no_context_takeover; client_no_context_takeover",
            );
        }

        response
    }

    /// The dedicated unsupported-version signal
    pub fn unsupported_version_response() -> HttpResponse {
        HttpResponse::new(426).with_header("sec-websocket-version", SUPPORTED_VERSION)
    }
}

/// Compute the `Sec-WebSocket-Accept` value for a client key
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    fn stream_request(version: &str, compression_offered: bool) -> StreamRequest {
        StreamRequest {
            host: "example.com".to_string(),
            path: "/live/abc123".to_string(),
            stream_id: "abc123".to_string(),
            kind: MediaKind::Video,
            duration: None,
            key: "dGhlIHNhbXBsZSBub25jZQ==".to_string(),
            version: version.to_string(),
            compression_offered,
        }
    }

    #[test]
    fn test_accept_key_rfc_vector() {
        // Sample handshake from RFC 6455 section 1.3
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_switching_protocols_response() {
        let hs = Handshaker::new(&stream_request("13", false), true).unwrap();
        let res = hs.switching_protocols();

        assert_eq!(res.status(), 101);
        assert_eq!(res.header("upgrade"), Some("websocket"));
        assert_eq!(
            res.header("sec-websocket-accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
        assert_eq!(res.header("sec-websocket-extensions"), None);
    }

    #[test]
    fn test_location() {
        let hs = Handshaker::new(&stream_request("13", false), true).unwrap();
        assert_eq!(hs.location(), "ws://example.com/live/abc123");
    }

    #[test]
    fn test_unsupported_version() {
        let err = Handshaker::new(&stream_request("8", false), true).unwrap_err();
        assert_eq!(err, HandshakeError::UnsupportedVersion("8".to_string()));

        let res = Handshaker::unsupported_version_response();
        assert_eq!(res.status(), 426);
        assert_eq!(res.header("sec-websocket-version"), Some("13"));
    }

    #[test]
    fn test_compression_negotiation() {
        // Offered and enabled
        let hs = Handshaker::new(&stream_request("13", true), true).unwrap();
        assert!(hs.compression());
        assert!(hs
            .switching_protocols()
            .header("sec-websocket-extensions")
            .unwrap()
            .contains("permessage-deflate"));

        // Offered but disabled in config
        let hs = Handshaker::new(&stream_request("13", true), false).unwrap();
        assert!(!hs.compression());

        // Enabled but not offered
        let hs = Handshaker::new(&stream_request("13", false), true).unwrap();
        assert!(!hs.compression());
    }
}
