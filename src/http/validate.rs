//! Upgrade request validation
//!
//! Stateless checks on an inbound upgrade request, producing either a
//! normalized [`StreamRequest`] or a terminal error status. Rejections
//! here are expected traffic, not failures: they are logged at `warn` at
//! most and have no side effects.

use crate::http::request::{HttpRequest, QueryString};
use crate::media::MediaKind;

/// Validation outcome carrying the response status for the rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Request could not be decoded (400)
    MalformedRequest,
    /// Only the read-only retrieval method is allowed (403)
    MethodNotAllowed,
    /// Host header or upgrade header triad missing (403)
    HeaderMissing(&'static str),
    /// Path outside the configured stream root (404)
    RouteNotFound,
    /// Missing or invalid query parameter (400)
    ParameterInvalid(&'static str),
}

impl ValidationError {
    /// HTTP status for the terminal response
    pub fn status(&self) -> u16 {
        match self {
            ValidationError::MalformedRequest => 400,
            ValidationError::MethodNotAllowed => 403,
            ValidationError::HeaderMissing(_) => 403,
            ValidationError::RouteNotFound => 404,
            ValidationError::ParameterInvalid(_) => 400,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MalformedRequest => write!(f, "malformed request"),
            ValidationError::MethodNotAllowed => write!(f, "method not allowed"),
            ValidationError::HeaderMissing(name) => write!(f, "missing header: {}", name),
            ValidationError::RouteNotFound => write!(f, "route not found"),
            ValidationError::ParameterInvalid(name) => {
                write!(f, "missing or invalid parameter: {}", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validated, normalized upgrade request
///
/// Built once per request and immutable afterwards. The handshake fields
/// are captured here so the negotiator never re-reads raw headers.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Host header value
    pub host: String,
    /// Decoded request path
    pub path: String,
    /// Path with the stream-root prefix stripped; never empty
    pub stream_id: String,
    /// Requested media kind
    pub kind: MediaKind,
    /// Pacing duration in seconds; present iff `kind` is audio
    pub duration: Option<f64>,
    /// Client handshake key
    pub key: String,
    /// Client handshake version
    pub version: String,
    /// Whether the client offered permessage-deflate
    pub compression_offered: bool,
}

/// Validate an upgrade request against the configured stream root
///
/// Checks run in a fixed order and short-circuit; see the module docs.
pub fn validate(req: &HttpRequest, stream_root: &str) -> Result<StreamRequest, ValidationError> {
    if req.method() != "GET" {
        return Err(ValidationError::MethodNotAllowed);
    }

    let host = match req.header("host") {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => return Err(ValidationError::HeaderMissing("host")),
    };

    let query = QueryString::parse(req.uri());
    let path = query.path().to_string();

    if !path.starts_with(stream_root) || path.len() <= stream_root.len() {
        return Err(ValidationError::RouteNotFound);
    }
    let stream_id = path[stream_root.len()..].to_string();

    let kind = match query.param("type") {
        None | Some("") => {
            tracing::warn!("The parameter type is absent");
            return Err(ValidationError::ParameterInvalid("type"));
        }
        Some("1") => MediaKind::Video,
        Some("2") => MediaKind::Audio,
        Some(other) => {
            tracing::warn!(value = other, "Unknown media type code");
            return Err(ValidationError::ParameterInvalid("type"));
        }
    };

    let duration = if kind == MediaKind::Audio {
        let raw = query
            .param("duration")
            .ok_or(ValidationError::ParameterInvalid("duration"))?;
        let value: f64 = raw
            .parse()
            .map_err(|_| ValidationError::ParameterInvalid("duration"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::ParameterInvalid("duration"));
        }
        Some(value)
    } else {
        None
    };

    for name in ["upgrade", "sec-websocket-key", "sec-websocket-version"] {
        if !req.has_header(name) {
            return Err(ValidationError::HeaderMissing("upgrade header triad"));
        }
    }

    let compression_offered = req
        .header("sec-websocket-extensions")
        .map(|v| v.to_ascii_lowercase().contains("permessage-deflate"))
        .unwrap_or(false);

    Ok(StreamRequest {
        host,
        path,
        stream_id,
        kind,
        duration,
        key: req.header("sec-websocket-key").unwrap_or_default().to_string(),
        version: req
            .header("sec-websocket-version")
            .unwrap_or_default()
            .to_string(),
        compression_offered,
    })
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    const ROOT: &str = "/live/";

    fn request(raw: &str) -> HttpRequest {
        let mut buf = BytesMut::from(raw.as_bytes());
        HttpRequest::parse(&mut buf, 8192).unwrap().unwrap()
    }

    fn upgrade_request(uri: &str) -> HttpRequest {
        request(&format!(
            "GET {} HTTP/1.1\r\n\
             Host: example.com\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n",
            uri
        ))
    }

    #[test]
    fn test_valid_video_request() {
        let req = upgrade_request("/live/abc123?type=1");
        let out = validate(&req, ROOT).unwrap();

        assert_eq!(out.stream_id, "abc123");
        assert_eq!(out.kind, MediaKind::Video);
        assert_eq!(out.duration, None);
        assert_eq!(out.host, "example.com");
        assert_eq!(out.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert!(!out.compression_offered);
    }

    #[test]
    fn test_valid_audio_request_parses_duration() {
        let req = upgrade_request("/live/abc123?type=2&duration=3.5");
        let out = validate(&req, ROOT).unwrap();

        assert_eq!(out.kind, MediaKind::Audio);
        assert_eq!(out.duration, Some(3.5));
    }

    #[test]
    fn test_non_get_rejected() {
        let req = request("POST /live/abc?type=1 HTTP/1.1\r\nHost: h\r\n\r\n");
        let err = validate(&req, ROOT).unwrap_err();

        assert_eq!(err, ValidationError::MethodNotAllowed);
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_missing_host_rejected() {
        let req = request("GET /live/abc?type=1 HTTP/1.1\r\nUpgrade: websocket\r\n\r\n");
        let err = validate(&req, ROOT).unwrap_err();

        assert!(matches!(err, ValidationError::HeaderMissing(_)));
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_empty_host_rejected() {
        let req = request("GET /live/abc?type=1 HTTP/1.1\r\nHost:\r\n\r\n");
        assert!(matches!(
            validate(&req, ROOT).unwrap_err(),
            ValidationError::HeaderMissing(_)
        ));
    }

    #[test]
    fn test_path_outside_root_rejected() {
        let req = upgrade_request("/other/abc?type=1");
        let err = validate(&req, ROOT).unwrap_err();

        assert_eq!(err, ValidationError::RouteNotFound);
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_bare_root_rejected() {
        // Path must be strictly longer than the root
        let req = upgrade_request("/live/?type=1");
        assert_eq!(validate(&req, ROOT).unwrap_err(), ValidationError::RouteNotFound);
    }

    #[test]
    fn test_missing_type_rejected() {
        let req = upgrade_request("/live/abc123");
        let err = validate(&req, ROOT).unwrap_err();

        assert_eq!(err, ValidationError::ParameterInvalid("type"));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let req = upgrade_request("/live/abc123?type=9");
        assert_eq!(
            validate(&req, ROOT).unwrap_err(),
            ValidationError::ParameterInvalid("type")
        );
    }

    #[test]
    fn test_audio_without_duration_rejected() {
        let req = upgrade_request("/live/abc123?type=2");
        assert_eq!(
            validate(&req, ROOT).unwrap_err(),
            ValidationError::ParameterInvalid("duration")
        );
    }

    #[test]
    fn test_audio_with_non_numeric_duration_rejected() {
        let req = upgrade_request("/live/abc123?type=2&duration=abc");
        let err = validate(&req, ROOT).unwrap_err();

        assert_eq!(err, ValidationError::ParameterInvalid("duration"));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let req = upgrade_request("/live/abc123?type=2&duration=-1.5");
        assert_eq!(
            validate(&req, ROOT).unwrap_err(),
            ValidationError::ParameterInvalid("duration")
        );
    }

    #[test]
    fn test_missing_upgrade_headers_rejected() {
        let req = request(
            "GET /live/abc123?type=1 HTTP/1.1\r\nHost: example.com\r\n\r\n",
        );
        let err = validate(&req, ROOT).unwrap_err();

        assert!(matches!(err, ValidationError::HeaderMissing(_)));
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_compression_offer_detected() {
        let req = request(
            "GET /live/abc?type=1 HTTP/1.1\r\n\
             Host: h\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Key: k\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Extensions: permessage-deflate; client_max_window_bits\r\n\r\n",
        );
        assert!(validate(&req, ROOT).unwrap().compression_offered);
    }
}
