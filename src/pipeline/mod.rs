//! Per-connection processing chain
//!
//! Every connection carries an ordered list of stages that can be
//! reconfigured at runtime. A fresh connection holds the single
//! `http-request` stage; a successful upgrade removes it and installs the
//! streaming chain in this fixed, declared order:
//!
//! ```text
//! socket ◄── idle-monitor ◄── compression ◄── frame-codec ◄── media-mux ◄── publish
//!                                                                │
//!                                    error-handler (terminal, shared)
//! ```
//!
//! The declared order is socket-side first; outbound media enters at the
//! mux and flows toward the socket. The terminal error handler is one
//! shared instance per gateway and observes failures from any earlier
//! stage.

pub mod codec;
pub mod deflate;
pub mod error;
pub mod idle;
pub mod mux;

pub use codec::FrameCodec;
pub use deflate::Deflate;
pub use error::ErrorStage;
pub use idle::IdleMonitor;
pub use mux::FlvMux;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::PipelineError;
use crate::media::MediaUnit;
use crate::subscriber::SubscriberKind;
use crate::ws::frame::WsFrame;

/// One stage of a connection's chain
///
/// A tagged variant per stage kind; dispatch is a single match.
pub enum Stage {
    /// Initial request/response stage, removed on upgrade
    HttpRequest,
    /// Closes the connection when outbound traffic stops
    IdleMonitor(IdleMonitor),
    /// permessage-deflate for the upgraded transport
    Compression(Deflate),
    /// Wraps muxed payloads into binary frames
    FrameCodec(FrameCodec),
    /// Turns published media units into container payloads
    MediaMux(FlvMux),
    /// Shared terminal failure observer
    ErrorHandler(ErrorStage),
}

impl Stage {
    /// Stable stage name for logging and introspection
    pub fn name(&self) -> &'static str {
        match self {
            Stage::HttpRequest => "http-request",
            Stage::IdleMonitor(_) => "idle-monitor",
            Stage::Compression(_) => "compression",
            Stage::FrameCodec(_) => "frame-codec",
            Stage::MediaMux(_) => "media-mux",
            Stage::ErrorHandler(_) => "error-handler",
        }
    }
}

/// The mutable, ordered stage chain of one connection
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// The chain a connection starts with: plain request/response handling
    pub fn request() -> Self {
        Self {
            stages: vec![Stage::HttpRequest],
        }
    }

    /// Whether the streaming chain has been installed
    pub fn is_streaming(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s, Stage::MediaMux(_)))
    }

    /// Stage names in declared order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Mark outbound activity on the idle monitor
    pub fn touch(&mut self) {
        for stage in &mut self.stages {
            if let Stage::IdleMonitor(idle) = stage {
                idle.touch();
            }
        }
    }

    /// Deadline at which the connection counts as idle
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.stages.iter().find_map(|s| match s {
            Stage::IdleMonitor(idle) => Some(idle.deadline()),
            _ => None,
        })
    }

    /// Run one published unit through the chain
    ///
    /// The unit enters at the mux stage and flows toward the socket end;
    /// the returned frames are ready to write in order.
    pub fn on_media(&mut self, unit: MediaUnit) -> Result<Vec<WsFrame>, PipelineError> {
        let mut payloads = Vec::new();
        let mut frames = Vec::new();

        for stage in self.stages.iter_mut().rev() {
            match stage {
                Stage::ErrorHandler(_) | Stage::HttpRequest => {}
                Stage::MediaMux(mux) => payloads = mux.mux(&unit),
                Stage::FrameCodec(codec) => {
                    frames = payloads.drain(..).map(|p| codec.frame(p)).collect();
                }
                Stage::Compression(deflate) => {
                    for frame in &mut frames {
                        deflate.compress(frame)?;
                    }
                }
                Stage::IdleMonitor(idle) => idle.touch(),
            }
        }

        Ok(frames)
    }

    /// Hand a chain failure to the terminal error stage
    ///
    /// Returns the close frame to send before tearing the connection down.
    pub fn on_error(&self, session_id: u64, err: &PipelineError) -> WsFrame {
        for stage in self.stages.iter().rev() {
            if let Stage::ErrorHandler(handler) = stage {
                return handler.observe(session_id, err);
            }
        }
        // No error stage installed; close with the generic internal code
        WsFrame::close(crate::ws::frame::CLOSE_INTERNAL, "internal error")
    }
}

/// Builder for the streaming chain
///
/// Constructs the full chain from the declared stage list and installs it
/// in one step, replacing whatever the connection held before.
pub struct PipelineBuilder {
    stream_id: String,
    kind: SubscriberKind,
    idle_interval: Duration,
    compression: bool,
    error_stage: ErrorStage,
}

impl PipelineBuilder {
    /// Start a builder for the given stream and subscriber kind
    pub fn new(stream_id: impl Into<String>, kind: SubscriberKind) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind,
            idle_interval: Duration::from_secs(10),
            compression: false,
            error_stage: ErrorStage::new(),
        }
    }

    /// Set the outbound idle interval
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Enable the negotiated compression
    pub fn compression(mut self, negotiated: bool) -> Self {
        self.compression = negotiated;
        self
    }

    /// Use the gateway's shared error stage
    pub fn error_stage(mut self, stage: ErrorStage) -> Self {
        self.error_stage = stage;
        self
    }

    /// Replace the connection's chain with the streaming chain
    ///
    /// The previous stages (the plain request stage included) are removed;
    /// from here on the connection has streaming semantics only.
    pub fn install(self, pipeline: &mut Pipeline) {
        pipeline.stages = vec![
            Stage::IdleMonitor(IdleMonitor::new(self.idle_interval)),
            Stage::Compression(Deflate::new(self.compression)),
            Stage::FrameCodec(FrameCodec::new(self.stream_id.clone())),
            Stage::MediaMux(FlvMux::new(self.stream_id, self.kind)),
            Stage::ErrorHandler(self.error_stage),
        ];
    }
}
