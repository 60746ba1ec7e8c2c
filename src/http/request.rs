//! HTTP request-head parsing
//!
//! Incremental: `HttpRequest::parse` consumes a complete request head from
//! the buffer when one is present and leaves any following bytes (the
//! first WebSocket frames of an eager client) untouched.

use std::collections::HashMap;

use bytes::BytesMut;

use crate::error::HttpError;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A decoded HTTP request head
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: String,
    uri: String,
    version: String,
    /// Header names lowercased; first occurrence wins
    headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Try to decode one request head from the buffer
    ///
    /// Returns `Ok(None)` until a full head is buffered. The head bytes
    /// are consumed on success; trailing bytes stay in the buffer.
    pub fn parse(buf: &mut BytesMut, max_size: usize) -> Result<Option<HttpRequest>, HttpError> {
        let Some(end) = find_terminator(buf) else {
            if buf.len() > max_size {
                return Err(HttpError::RequestTooLarge(max_size));
            }
            return Ok(None);
        };

        if end + HEAD_TERMINATOR.len() > max_size {
            return Err(HttpError::RequestTooLarge(max_size));
        }

        let head = buf.split_to(end + HEAD_TERMINATOR.len());
        let head = std::str::from_utf8(&head[..end]).map_err(|_| HttpError::InvalidEncoding)?;

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(HttpError::InvalidRequestLine)?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next().ok_or(HttpError::InvalidRequestLine)?;
        let uri = parts.next().ok_or(HttpError::InvalidRequestLine)?;
        let version = parts.next().ok_or(HttpError::InvalidRequestLine)?;
        if parts.next().is_some() {
            return Err(HttpError::InvalidRequestLine);
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or(HttpError::InvalidHeader)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(HttpError::InvalidHeader);
            }
            headers
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| value.trim().to_string());
        }

        Ok(Some(HttpRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
            headers,
        }))
    }

    /// Request method, as sent
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URI, including any query string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Protocol version, e.g. `HTTP/1.1`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Whether a header is present at all
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Whether the client expects the connection to stay open after a
    /// plain response
    pub fn is_keep_alive(&self) -> bool {
        let connection = self
            .header("connection")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if connection.contains("close") {
            return false;
        }
        if self.version == "HTTP/1.0" {
            return connection.contains("keep-alive");
        }
        true
    }
}

fn find_terminator(buf: &BytesMut) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

/// Decoded request path and query parameters
#[derive(Debug, Clone)]
pub struct QueryString {
    path: String,
    /// First value wins for repeated parameters
    params: HashMap<String, String>,
}

impl QueryString {
    /// Split and percent-decode a request URI
    pub fn parse(uri: &str) -> Self {
        let (raw_path, raw_query) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (uri, None),
        };

        let mut params = HashMap::new();
        if let Some(query) = raw_query {
            for pair in query.split('&') {
                if pair.is_empty() {
                    continue;
                }
                let (key, value) = match pair.split_once('=') {
                    Some((k, v)) => (k, v),
                    None => (pair, ""),
                };
                let key = percent_decode(key, true);
                params
                    .entry(key)
                    .or_insert_with(|| percent_decode(value, true));
            }
        }

        Self {
            path: percent_decode(raw_path, false),
            params,
        }
    }

    /// Decoded path component
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }
}

fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(s: &str) -> BytesMut {
        BytesMut::from(s.as_bytes())
    }

    #[test]
    fn test_parse_full_request() {
        let mut b = buf(
            "GET /live/abc123?type=1 HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\n\r\n",
        );
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();

        assert_eq!(req.method(), "GET");
        assert_eq!(req.uri(), "/live/abc123?type=1");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(req.header("HOST"), Some("example.com"));
        assert!(req.has_header("Upgrade"));
        assert!(b.is_empty());
    }

    #[test]
    fn test_parse_incremental() {
        let mut b = buf("GET / HTTP/1.1\r\nHost: ex");
        assert!(HttpRequest::parse(&mut b, 8192).unwrap().is_none());

        b.extend_from_slice(b"ample.com\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert_eq!(req.header("host"), Some("example.com"));
    }

    #[test]
    fn test_parse_preserves_trailing_bytes() {
        let mut b = buf("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
        b.extend_from_slice(&[0x82, 0x05]);
        let _req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();

        assert_eq!(&b[..], &[0x82, 0x05]);
    }

    #[test]
    fn test_parse_request_too_large() {
        let mut b = buf("GET / HTTP/1.1\r\n");
        b.extend_from_slice(&vec![b'a'; 9000]);

        let err = HttpRequest::parse(&mut b, 8192).unwrap_err();
        assert_eq!(err, HttpError::RequestTooLarge(8192));
    }

    #[test]
    fn test_parse_bad_request_line() {
        let mut b = buf("GET /\r\nHost: h\r\n\r\n");
        assert_eq!(
            HttpRequest::parse(&mut b, 8192).unwrap_err(),
            HttpError::InvalidRequestLine
        );
    }

    #[test]
    fn test_parse_bad_header() {
        let mut b = buf("GET / HTTP/1.1\r\nno-colon-here\r\n\r\n");
        assert_eq!(
            HttpRequest::parse(&mut b, 8192).unwrap_err(),
            HttpError::InvalidHeader
        );
    }

    #[test]
    fn test_first_header_occurrence_wins() {
        let mut b = buf("GET / HTTP/1.1\r\nHost: first\r\nHost: second\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert_eq!(req.header("host"), Some("first"));
    }

    #[test]
    fn test_keep_alive_defaults() {
        let mut b = buf("GET / HTTP/1.1\r\nHost: h\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert!(req.is_keep_alive());

        let mut b = buf("GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert!(!req.is_keep_alive());

        let mut b = buf("GET / HTTP/1.0\r\nHost: h\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert!(!req.is_keep_alive());

        let mut b = buf("GET / HTTP/1.0\r\nHost: h\r\nConnection: keep-alive\r\n\r\n");
        let req = HttpRequest::parse(&mut b, 8192).unwrap().unwrap();
        assert!(req.is_keep_alive());
    }

    #[test]
    fn test_query_string_decoding() {
        let qs = QueryString::parse("/live/ab%2Fcd?type=2&duration=3.5&note=a+b%21");

        assert_eq!(qs.path(), "/live/ab/cd");
        assert_eq!(qs.param("type"), Some("2"));
        assert_eq!(qs.param("duration"), Some("3.5"));
        assert_eq!(qs.param("note"), Some("a b!"));
        assert_eq!(qs.param("missing"), None);
    }

    #[test]
    fn test_query_string_repeated_param() {
        let qs = QueryString::parse("/p?type=1&type=2");
        assert_eq!(qs.param("type"), Some("1"));
    }

    #[test]
    fn test_query_string_no_query() {
        let qs = QueryString::parse("/live/abc123");
        assert_eq!(qs.path(), "/live/abc123");
        assert_eq!(qs.param("type"), None);
    }
}
