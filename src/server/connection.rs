//! Per-connection worker
//!
//! Drives one client from the inbound upgrade request to teardown:
//! Validator → Negotiator → Pipeline Builder, then the streaming loop
//! that renders registry fan-out into outbound frames. Every failure maps
//! to a response here; nothing in this path retries.
//!
//! The worker is generic over the socket so tests can drive it over an
//! in-memory duplex stream.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{HandshakeError, HttpError, Result};
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::http::validate::{self, ValidationError};
use crate::media::{MediaKind, MediaUnit};
use crate::pipeline::{ErrorStage, Pipeline, PipelineBuilder};
use crate::registry::StreamRegistry;
use crate::server::config::GatewayConfig;
use crate::stats::GatewayStats;
use crate::subscriber::{Subscriber, SubscriberKind};
use crate::ws::frame::{self, OpCode, WsFrame, CLOSE_GOING_AWAY, CLOSE_NORMAL};
use crate::ws::handshake::Handshaker;

/// Outcome of reading the upgrade request
enum RequestPhase {
    Request(HttpRequest),
    Malformed(HttpError),
    Closed,
}

/// One iteration of the streaming loop
enum Event {
    Media(Option<MediaUnit>),
    Read(usize),
    Idle,
}

/// A single client connection
pub struct Connection<S> {
    session_id: u64,
    stream: S,
    peer_addr: SocketAddr,
    config: GatewayConfig,
    registry: Arc<StreamRegistry>,
    error_stage: ErrorStage,
    stats: Arc<GatewayStats>,
    pipeline: Pipeline,
    /// Connection-associated state store; at most one subscriber per
    /// connection, set by the handshake continuation, cleared by teardown
    subscriber: Option<Arc<Subscriber>>,
    read_buf: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a worker for an accepted socket
    pub fn new(
        session_id: u64,
        stream: S,
        peer_addr: SocketAddr,
        config: GatewayConfig,
        registry: Arc<StreamRegistry>,
        error_stage: ErrorStage,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            session_id,
            stream,
            peer_addr,
            config,
            registry,
            error_stage,
            stats,
            pipeline: Pipeline::request(),
            subscriber: None,
            read_buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Run the connection to completion
    ///
    /// Teardown always runs before this returns: the subscriber is
    /// detached exactly once and the socket is shut down.
    pub async fn run(mut self) -> Result<()> {
        let result = self.run_inner().await;
        self.teardown().await;
        result
    }

    async fn run_inner(&mut self) -> Result<()> {
        let phase = match tokio::time::timeout(self.config.request_timeout, self.read_request())
            .await
        {
            Ok(phase) => phase?,
            Err(_) => {
                tracing::debug!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    "No request within timeout"
                );
                return Ok(());
            }
        };

        let request = match phase {
            RequestPhase::Request(request) => request,
            RequestPhase::Malformed(e) => {
                tracing::warn!(session_id = self.session_id, error = %e, "Malformed request");
                self.stats.request_rejected();
                let status = ValidationError::MalformedRequest.status();
                self.send_response(HttpResponse::new(status), false).await?;
                return Ok(());
            }
            RequestPhase::Closed => return Ok(()),
        };

        match self.handle_request(request).await {
            Ok(()) => Ok(()),
            Err(e) if !self.pipeline.is_streaming() => {
                // Catch-all for unexpected failures during the upgrade
                // sequence
                tracing::error!(session_id = self.session_id, error = %e, "Internal error");
                let _ = self.send_response(HttpResponse::new(500), false).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Read one request head, tolerating partial arrivals
    async fn read_request(&mut self) -> Result<RequestPhase> {
        loop {
            match HttpRequest::parse(&mut self.read_buf, self.config.max_request_size) {
                Ok(Some(request)) => return Ok(RequestPhase::Request(request)),
                Ok(None) => {}
                Err(e) => return Ok(RequestPhase::Malformed(e)),
            }

            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Ok(RequestPhase::Closed);
            }
        }
    }

    /// Validator → Negotiator → Pipeline Builder, then the streaming loop
    async fn handle_request(&mut self, request: HttpRequest) -> Result<()> {
        let keep_alive = request.is_keep_alive();

        let stream_request = match validate::validate(&request, &self.config.stream_root) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(
                    session_id = self.session_id,
                    status = e.status(),
                    reason = %e,
                    "Request rejected"
                );
                self.stats.request_rejected();
                self.send_response(HttpResponse::new(e.status()), keep_alive)
                    .await?;
                return Ok(());
            }
        };

        let handshaker = match Handshaker::new(&stream_request, self.config.compression) {
            Ok(h) => h,
            Err(HandshakeError::UnsupportedVersion(version)) => {
                tracing::debug!(
                    session_id = self.session_id,
                    version = %version,
                    "Unsupported handshake version"
                );
                // Dedicated signal; connection disposal stays with the
                // caller
                self.write_bytes(&Handshaker::unsupported_version_response().encode())
                    .await?;
                return Ok(());
            }
        };

        tracing::debug!(
            session_id = self.session_id,
            stream = %stream_request.stream_id,
            location = handshaker.location(),
            "Upgrading connection"
        );

        let kind = match stream_request.kind {
            MediaKind::Video => SubscriberKind::Video,
            MediaKind::Audio => SubscriberKind::Audio {
                duration: stream_request.duration.unwrap_or(0.0),
            },
        };

        // The connection is reassigned from request/response to streaming
        // semantics now, before the handshake's own completion
        PipelineBuilder::new(stream_request.stream_id.clone(), kind)
            .idle_interval(self.config.idle_interval)
            .compression(handshaker.compression())
            .error_stage(self.error_stage.clone())
            .install(&mut self.pipeline);

        let (subscriber, media_rx) =
            Subscriber::channel(self.session_id, stream_request.stream_id.clone(), kind);

        // Handshake completion is the flush of the 101 response;
        // registration runs only in the success continuation.
        match self
            .write_bytes(&handshaker.switching_protocols().encode())
            .await
        {
            Ok(()) => match self.registry.subscribe(Arc::clone(&subscriber)).await {
                Ok(()) => {
                    self.stats.subscriber_attached();
                    self.subscriber = Some(subscriber);
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = self.session_id,
                        error = %e,
                        "Subscriber not registered"
                    );
                }
            },
            Err(e) => {
                tracing::debug!(
                    session_id = self.session_id,
                    error = %e,
                    "Handshake flush failed"
                );
                let _ = self.write_frame(&WsFrame::close(CLOSE_NORMAL, "")).await;
                return Ok(());
            }
        }

        self.stats.connection_upgraded();
        self.streaming_loop(media_rx).await
    }

    /// Fan-in loop: registry deliveries, client control frames, idle
    /// enforcement
    async fn streaming_loop(
        &mut self,
        mut media_rx: mpsc::UnboundedReceiver<MediaUnit>,
    ) -> Result<()> {
        let mut media_done = false;

        loop {
            // Drain complete client frames already buffered
            loop {
                match WsFrame::parse(&mut self.read_buf, self.config.max_frame_size, true) {
                    Ok(Some(client_frame)) => {
                        if self.handle_client_frame(client_frame).await? {
                            return Ok(());
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(
                            session_id = self.session_id,
                            error = %e,
                            "Bad client frame"
                        );
                        let close = WsFrame::close(frame::close_code_for(&e), "protocol error");
                        let _ = self.write_frame(&close).await;
                        return Ok(());
                    }
                }
            }

            let deadline = self
                .pipeline
                .idle_deadline()
                .unwrap_or_else(|| Instant::now() + self.config.idle_interval);

            let event = tokio::select! {
                unit = media_rx.recv(), if !media_done => Event::Media(unit),
                result = self.stream.read_buf(&mut self.read_buf) => Event::Read(result?),
                _ = tokio::time::sleep_until(deadline) => Event::Idle,
            };

            match event {
                Event::Media(Some(unit)) => {
                    if self.dispatch_media(unit).await? {
                        return Ok(());
                    }
                }
                Event::Media(None) => media_done = true,
                Event::Read(0) => {
                    tracing::debug!(session_id = self.session_id, "Peer closed connection");
                    return Ok(());
                }
                Event::Read(_) => {}
                Event::Idle => {
                    tracing::debug!(
                        session_id = self.session_id,
                        interval = ?self.config.idle_interval,
                        "Closing idle connection"
                    );
                    let _ = self
                        .write_frame(&WsFrame::close(CLOSE_GOING_AWAY, "idle timeout"))
                        .await;
                    return Ok(());
                }
            }
        }
    }

    /// Run one published unit through the chain and write the frames out
    ///
    /// Returns true when a chain failure closed the connection.
    async fn dispatch_media(&mut self, unit: MediaUnit) -> Result<bool> {
        match self.pipeline.on_media(unit) {
            Ok(frames) => {
                let count = frames.len() as u64;
                for outbound in &frames {
                    self.write_frame(outbound).await?;
                }
                self.stats.frames_delivered(count);
                Ok(false)
            }
            Err(e) => {
                let close = self.pipeline.on_error(self.session_id, &e);
                let _ = self.write_frame(&close).await;
                Ok(true)
            }
        }
    }

    /// Handle an inbound frame; returns true when the connection should
    /// close
    async fn handle_client_frame(&mut self, client_frame: WsFrame) -> Result<bool> {
        match client_frame.opcode {
            OpCode::Close => {
                tracing::debug!(
                    session_id = self.session_id,
                    code = ?client_frame.close_code(),
                    "Client requested close"
                );
                let _ = self.write_frame(&WsFrame::close(CLOSE_NORMAL, "")).await;
                Ok(true)
            }
            OpCode::Ping => {
                self.write_frame(&WsFrame::pong(client_frame.payload)).await?;
                Ok(false)
            }
            _ => {
                tracing::trace!(
                    session_id = self.session_id,
                    opcode = ?client_frame.opcode,
                    "Ignoring client frame"
                );
                Ok(false)
            }
        }
    }

    /// Write an error-path response; the connection closes after the
    /// flush (every response here is non-200)
    async fn send_response(&mut self, response: HttpResponse, keep_alive: bool) -> Result<()> {
        let closing = response.should_close(keep_alive);
        self.write_bytes(&response.encode()).await?;
        if closing {
            tracing::trace!(
                session_id = self.session_id,
                status = response.status(),
                "Closing after response"
            );
        }
        Ok(())
    }

    async fn write_frame(&mut self, outbound: &WsFrame) -> Result<()> {
        self.write_bytes(&outbound.encode()).await
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        self.pipeline.touch();
        Ok(())
    }

    /// Deterministic cleanup: detach before the socket goes away
    async fn teardown(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.detach(&self.registry).await;
            self.stats.subscriber_detached();
        }
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    use super::*;
    use crate::media::MediaKind;

    const UPGRADE_HEADERS: &str = "Host: example.com\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n";

    fn test_config() -> GatewayConfig {
        GatewayConfig::default()
            .stream_root("/live/")
            .idle_interval(Duration::from_secs(10))
            .request_timeout(Duration::from_secs(5))
    }

    struct Harness {
        client: DuplexStream,
        registry: Arc<StreamRegistry>,
        stats: Arc<GatewayStats>,
        handle: JoinHandle<Result<()>>,
    }

    fn spawn_connection(config: GatewayConfig) -> Harness {
        let (client, server) = duplex(64 * 1024);
        let registry = Arc::new(StreamRegistry::new());
        let stats = Arc::new(GatewayStats::new());

        let connection = Connection::new(
            1,
            server,
            "127.0.0.1:50000".parse().unwrap(),
            config,
            Arc::clone(&registry),
            ErrorStage::new(),
            Arc::clone(&stats),
        );

        Harness {
            client,
            registry,
            stats,
            handle: tokio::spawn(connection.run()),
        }
    }

    async fn read_head(client: &mut DuplexStream) -> String {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        while !buf.ends_with(b"\r\n\r\n") {
            client.read_exact(&mut byte).await.unwrap();
            buf.push(byte[0]);
        }
        String::from_utf8(buf).unwrap()
    }

    async fn read_to_end(mut client: DuplexStream) -> String {
        let mut buf = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    async fn read_server_frame(client: &mut DuplexStream, buf: &mut BytesMut) -> WsFrame {
        loop {
            if let Some(frame) = WsFrame::parse(buf, 8 * 1024 * 1024, false).unwrap() {
                return frame;
            }
            let n = tokio::time::timeout(Duration::from_secs(2), client.read_buf(buf))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "connection closed while waiting for a frame");
        }
    }

    async fn wait_for_subscribers(registry: &StreamRegistry, stream: &str, count: usize) {
        for _ in 0..200 {
            if registry.subscriber_count(stream).await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber count for {} never reached {}", stream, count);
    }

    async fn upgrade(client: &mut DuplexStream, uri: &str) -> String {
        client
            .write_all(format!("GET {} HTTP/1.1\r\n{}", uri, UPGRADE_HEADERS).as_bytes())
            .await
            .unwrap();
        read_head(client).await
    }

    #[tokio::test]
    async fn test_non_get_rejected_with_403() {
        let mut h = spawn_connection(test_config());

        h.client
            .write_all(b"POST /live/abc123?type=1 HTTP/1.1\r\nHost: h\r\n\r\n")
            .await
            .unwrap();

        let response = read_to_end(h.client).await;
        assert!(response.starts_with("HTTP/1.1 403 Forbidden"));
        assert!(response.ends_with("403 Forbidden"));
        assert_eq!(h.registry.stream_count().await, 0);
        assert_eq!(h.stats.snapshot().rejected_requests, 1);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_path_outside_root_rejected_with_404() {
        let mut h = spawn_connection(test_config());

        h.client
            .write_all(format!("GET /other/abc?type=1 HTTP/1.1\r\n{}", UPGRADE_HEADERS).as_bytes())
            .await
            .unwrap();

        let response = read_to_end(h.client).await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_duration_rejected_with_400() {
        let mut h = spawn_connection(test_config());

        h.client
            .write_all(
                format!(
                    "GET /live/abc?type=2&duration=abc HTTP/1.1\r\n{}",
                    UPGRADE_HEADERS
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let response = read_to_end(h.client).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_rejected_with_400() {
        let mut h = spawn_connection(test_config());

        h.client.write_all(b"GARBAGE\r\n\r\n").await.unwrap();

        let response = read_to_end(h.client).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_version_gets_dedicated_signal() {
        let mut h = spawn_connection(test_config());

        h.client
            .write_all(
                b"GET /live/abc?type=1 HTTP/1.1\r\n\
                  Host: example.com\r\n\
                  Upgrade: websocket\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 8\r\n\r\n",
            )
            .await
            .unwrap();

        let response = read_to_end(h.client).await;
        assert!(response.starts_with("HTTP/1.1 426 Upgrade Required"));
        assert!(response.contains("sec-websocket-version: 13"));
        assert_eq!(h.registry.stream_count().await, 0);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_video_upgrade_registers_subscriber_and_streams_flv() {
        let mut h = spawn_connection(test_config());

        let head = upgrade(&mut h.client, "/live/abc123?type=1").await;
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols"));
        assert!(head.contains("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

        // Registration runs in the handshake continuation
        wait_for_subscribers(&h.registry, "abc123", 1).await;

        let subscribers = h.registry.subscribers("abc123").await;
        assert_eq!(subscribers[0].kind(), SubscriberKind::Video);
        assert_eq!(subscribers[0].duration(), None);
        assert_eq!(subscribers[0].kind().media_kind(), MediaKind::Video);

        // Publish two units; the first delivery carries the FLV header
        h.registry
            .publish("abc123", MediaUnit::video(0, Bytes::from_static(&[0x17, 0x01])))
            .await;
        h.registry
            .publish("abc123", MediaUnit::video(40, Bytes::from_static(&[0x27, 0x01])))
            .await;

        let mut buf = BytesMut::new();
        let header_frame = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(header_frame.opcode, OpCode::Binary);
        assert_eq!(&header_frame.payload[..3], b"FLV");

        let first_tag = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(first_tag.payload[0], 9); // video tag

        let second_tag = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(second_tag.payload[0], 9);

        // Client close detaches the subscriber exactly once
        let close = WsFrame::close(CLOSE_NORMAL, "").encode_masked([1, 2, 3, 4]);
        h.client.write_all(&close).await.unwrap();

        let reply = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(reply.opcode, OpCode::Close);

        h.handle.await.unwrap().unwrap();
        assert_eq!(h.registry.subscriber_count("abc123").await, 0);
        assert_eq!(h.registry.stream_count().await, 0);
        assert_eq!(h.stats.snapshot().active_subscribers, 0);
        assert_eq!(h.stats.snapshot().upgraded_connections, 1);
    }

    #[tokio::test]
    async fn test_audio_upgrade_carries_duration() {
        let mut h = spawn_connection(test_config());

        let head = upgrade(&mut h.client, "/live/abc123?type=2&duration=2.0").await;
        assert!(head.starts_with("HTTP/1.1 101"));

        wait_for_subscribers(&h.registry, "abc123", 1).await;

        let subscribers = h.registry.subscribers("abc123").await;
        assert_eq!(subscribers[0].kind(), SubscriberKind::Audio { duration: 2.0 });
        assert_eq!(subscribers[0].duration(), Some(2.0));

        drop(h.client);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_duration_parses_exactly() {
        let mut h = spawn_connection(test_config());

        upgrade(&mut h.client, "/live/s?type=2&duration=3.5").await;

        wait_for_subscribers(&h.registry, "s", 1).await;
        assert_eq!(h.registry.subscribers("s").await[0].duration(), Some(3.5));

        drop(h.client);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_disconnect_detaches_subscriber() {
        let mut h = spawn_connection(test_config());

        upgrade(&mut h.client, "/live/abc123?type=1").await;
        wait_for_subscribers(&h.registry, "abc123", 1).await;

        // Abrupt disconnect, no close frame
        drop(h.client);

        h.handle.await.unwrap().unwrap();
        assert_eq!(h.registry.subscriber_count("abc123").await, 0);
    }

    #[tokio::test]
    async fn test_idle_connection_closed_automatically() {
        let config = test_config().idle_interval(Duration::from_millis(100));
        let mut h = spawn_connection(config);

        upgrade(&mut h.client, "/live/abc123?type=1").await;

        // No publishes: the gateway must close on its own
        let mut buf = BytesMut::new();
        let close = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(close.opcode, OpCode::Close);
        assert_eq!(close.close_code(), Some(CLOSE_GOING_AWAY));

        h.handle.await.unwrap().unwrap();
        assert_eq!(h.registry.subscriber_count("abc123").await, 0);
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let mut h = spawn_connection(test_config());

        upgrade(&mut h.client, "/live/abc123?type=1").await;

        let ping = WsFrame {
            fin: true,
            rsv1: false,
            opcode: OpCode::Ping,
            payload: Bytes::from_static(b"hb"),
        };
        h.client
            .write_all(&ping.encode_masked([9, 8, 7, 6]))
            .await
            .unwrap();

        let mut buf = BytesMut::new();
        let pong = read_server_frame(&mut h.client, &mut buf).await;
        assert_eq!(pong.opcode, OpCode::Pong);
        assert_eq!(&pong.payload[..], b"hb");

        drop(h.client);
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_negotiated_compression_round_trips() {
        let mut h = spawn_connection(test_config());

        h.client
            .write_all(
                b"GET /live/abc123?type=1 HTTP/1.1\r\n\
                  Host: example.com\r\n\
                  Upgrade: websocket\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 13\r\n\
                  Sec-WebSocket-Extensions: permessage-deflate\r\n\r\n",
            )
            .await
            .unwrap();

        let head = read_head(&mut h.client).await;
        assert!(head.contains("permessage-deflate"));

        wait_for_subscribers(&h.registry, "abc123", 1).await;

        h.registry
            .publish(
                "abc123",
                MediaUnit::video(0, Bytes::from(vec![0x17; 256])),
            )
            .await;

        let mut buf = BytesMut::new();
        let header_frame = read_server_frame(&mut h.client, &mut buf).await;
        assert!(header_frame.rsv1);

        drop(h.client);
        h.handle.await.unwrap().unwrap();
    }
}
