//! HTTP response writing
//!
//! Error responses with an empty body are populated with the status text
//! and a matching content-length before they go on the wire.

use bytes::{BufMut, Bytes, BytesMut};

/// A response ready to be encoded onto the connection
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl HttpResponse {
    /// Create a response with the given status and no body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// First header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the connection must close after this response is flushed
    ///
    /// Non-200 and non-keep-alive responses close. The 101 switch never
    /// goes through this check: a successful handshake hands the
    /// connection to the streaming pipeline instead.
    pub fn should_close(&self, keep_alive: bool) -> bool {
        !keep_alive || self.status != 200
    }

    /// Encode the response head and body
    pub fn encode(&self) -> Bytes {
        let body = if self.body.is_empty() && self.status != 200 && self.status != 101 {
            Bytes::from(format!("{} {}", self.status, reason(self.status)))
        } else {
            self.body.clone()
        };

        let mut buf = BytesMut::with_capacity(128 + body.len());
        buf.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status)).as_bytes());

        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        if self.status != 101 {
            buf.put_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
        }

        buf.put_slice(b"\r\n");
        buf.put_slice(&body);
        buf.freeze()
    }
}

/// Reason phrase for the status codes the gateway emits
fn reason(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        426 => "Upgrade Required",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_filled_with_status_text() {
        let encoded = HttpResponse::new(403).encode();
        let text = String::from_utf8(encoded.to_vec()).unwrap();

        assert!(text.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(text.contains("content-length: 13\r\n"));
        assert!(text.ends_with("403 Forbidden"));
    }

    #[test]
    fn test_explicit_body_kept() {
        let encoded = HttpResponse::new(400)
            .with_body(Bytes::from_static(b"nope"))
            .encode();
        let text = String::from_utf8(encoded.to_vec()).unwrap();

        assert!(text.contains("content-length: 4\r\n"));
        assert!(text.ends_with("nope"));
    }

    #[test]
    fn test_switching_protocols_has_no_body() {
        let encoded = HttpResponse::new(101)
            .with_header("upgrade", "websocket")
            .encode();
        let text = String::from_utf8(encoded.to_vec()).unwrap();

        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("upgrade: websocket\r\n"));
        assert!(!text.contains("content-length"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_should_close() {
        assert!(HttpResponse::new(404).should_close(true));
        assert!(HttpResponse::new(200).should_close(false));
        assert!(!HttpResponse::new(200).should_close(true));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let res = HttpResponse::new(101).with_header("Sec-WebSocket-Accept", "x");
        assert_eq!(res.header("sec-websocket-accept"), Some("x"));
    }
}
