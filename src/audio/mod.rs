// ABOUTME: Audio side of the peer: playback control and live capture/encode
// ABOUTME: Player trait, PCM capture sources, encoder seam, ADTS framing, capture pipeline

/// ADTS header writer and parser
pub mod adts;
/// PCM capture source trait and format
pub mod capture;
/// cpal-backed microphone capture
pub mod cpal_capture;
/// Frame encoder and frame sink seams
pub mod encode;
/// Capture → encode → frame loop
pub mod pipeline;
/// Player trait and track references
pub mod player;

pub use adts::AdtsHeader;
pub use capture::{CaptureSource, PcmFormat};
pub use cpal_capture::CpalCapture;
pub use encode::{AccessUnit, EncodedFrame, EncoderConfig, FrameEncoder, FrameSink};
pub use pipeline::{CapturePipeline, PipelineStats, StartOutcome};
pub use player::{Player, TrackRef};
