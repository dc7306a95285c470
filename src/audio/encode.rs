// ABOUTME: Encoder capability and the frames it produces
// ABOUTME: PCM in, compressed access units out; framed units go to a sink

use crate::audio::capture::PcmFormat;
use crate::error::Error;
use std::time::Duration;

/// AAC Low Complexity audio object type, as written in ADTS headers.
pub const AAC_LC_PROFILE: u8 = 2;

/// Encoder target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// MPEG-4 audio object type (2 = AAC-LC)
    pub profile: u8,
    /// Input and output sample rate
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Largest input chunk the encoder accepts, in bytes
    pub max_input_size: usize,
}

impl EncoderConfig {
    /// AAC-LC at 128 kbit/s for `format`
    pub fn aac_lc(format: &PcmFormat) -> Self {
        Self {
            profile: AAC_LC_PROFILE,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bitrate: 128_000,
            max_input_size: 8192,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::aac_lc(&PcmFormat::default())
    }
}

/// One compressed unit as it leaves the encoder, before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Raw compressed bytes
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds
    pub presentation_timestamp_us: i64,
}

/// Self-contained frame handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// ADTS header followed by the access unit
    pub payload: Vec<u8>,
    /// Presentation timestamp in microseconds
    pub presentation_timestamp_us: i64,
}

/// Encoder owned by the capture loop.
pub trait FrameEncoder: Send {
    /// Configure and start the encoder.
    fn start(&mut self, config: &EncoderConfig) -> Result<(), Error>;

    /// Queue PCM for encoding, waiting at most `wait` for an input slot.
    ///
    /// Returns false if no slot became available; the chunk is not kept.
    fn submit_input(&mut self, pcm: &[u8], timestamp_us: i64, wait: Duration)
        -> Result<bool, Error>;

    /// Take one finished unit without blocking.
    fn poll_output(&mut self) -> Result<Option<AccessUnit>, Error>;

    /// Stop the encoder and release it.
    fn stop(&mut self) -> Result<(), Error>;
}

/// Destination of framed units. Takes ownership of every frame.
pub trait FrameSink: Send {
    /// Hand `frame` over. [`Error::ChannelClosed`] ends the capture loop;
    /// [`Error::SinkFull`] drops only this frame.
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), Error>;
}

impl FrameSink for crossbeam::channel::Sender<EncodedFrame> {
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), Error> {
        self.send(frame).map_err(|_| Error::ChannelClosed)
    }
}

impl FrameSink for tokio::sync::mpsc::Sender<EncodedFrame> {
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), Error> {
        use tokio::sync::mpsc::error::TrySendError;
        match self.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::SinkFull),
            Err(TrySendError::Closed(_)) => Err(Error::ChannelClosed),
        }
    }
}
