// ABOUTME: Capture source capability for the live pipeline
// ABOUTME: Raw interleaved PCM from a loopback or microphone primitive

use crate::error::Error;

/// Raw PCM format requested from a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channels
    pub channels: u16,
    /// Bits per sample (signed, little-endian)
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Bytes in one frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Microseconds of audio contained in `bytes`
    pub fn duration_micros(&self, bytes: usize) -> i64 {
        let frames = bytes / self.bytes_per_frame().max(1);
        (frames as i64 * 1_000_000) / self.sample_rate.max(1) as i64
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

/// Source of raw PCM owned by the capture loop.
pub trait CaptureSource: Send {
    /// Begin capturing `format` into an internal buffer of `buffer_bytes`.
    fn start(&mut self, format: &PcmFormat, buffer_bytes: usize) -> Result<(), Error>;

    /// Block until some PCM is available and copy it into `buf`.
    ///
    /// Returning 0 or an error is transient: the loop skips the iteration.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Stop capturing and release the underlying device.
    fn stop(&mut self) -> Result<(), Error>;
}
