// ABOUTME: ADTS framing for AAC access units
// ABOUTME: Writes and parses the fixed 7-byte MPEG-4 header (no CRC)

use crate::audio::encode::{AccessUnit, EncodedFrame, EncoderConfig};
use crate::error::Error;

/// Header size without CRC.
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value of the 13-bit frame length field.
pub const MAX_FRAME_LEN: usize = 0x1FFF;

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

/// MPEG-4 sampling frequency index for `sample_rate`.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|i| i as u8)
}

/// Stream parameters carried by every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// Audio object type (1-4; 2 = AAC-LC)
    pub profile: u8,
    /// Sampling frequency index
    pub freq_idx: u8,
    /// Channel configuration (0-7)
    pub chan_cfg: u8,
}

/// Header fields decoded from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAdts {
    /// Stream parameters
    pub header: AdtsHeader,
    /// Header plus payload length
    pub frame_len: usize,
}

impl AdtsHeader {
    /// Header for explicit field values.
    pub fn new(profile: u8, freq_idx: u8, chan_cfg: u8) -> Result<Self, Error> {
        if !(1..=4).contains(&profile) {
            return Err(Error::Framing(format!("profile {} out of range", profile)));
        }
        if freq_idx as usize >= SAMPLING_FREQUENCIES.len() {
            return Err(Error::Framing(format!(
                "sampling frequency index {} out of range",
                freq_idx
            )));
        }
        if chan_cfg > 7 {
            return Err(Error::Framing(format!(
                "channel configuration {} out of range",
                chan_cfg
            )));
        }
        Ok(Self {
            profile,
            freq_idx,
            chan_cfg,
        })
    }

    /// Header matching an encoder configuration.
    pub fn for_config(config: &EncoderConfig) -> Result<Self, Error> {
        let freq_idx = sampling_frequency_index(config.sample_rate).ok_or_else(|| {
            Error::Framing(format!("unsupported sample rate {}", config.sample_rate))
        })?;
        let chan_cfg = u8::try_from(config.channels)
            .map_err(|_| Error::Framing(format!("{} channels", config.channels)))?;
        Self::new(config.profile, freq_idx, chan_cfg)
    }

    /// Header bytes for a payload of `payload_len` bytes.
    pub fn encode(&self, payload_len: usize) -> Result<[u8; ADTS_HEADER_LEN], Error> {
        let frame_len = payload_len + ADTS_HEADER_LEN;
        if frame_len > MAX_FRAME_LEN {
            return Err(Error::Framing(format!(
                "frame of {} bytes exceeds {}",
                frame_len, MAX_FRAME_LEN
            )));
        }
        let profile = self.profile as usize;
        let freq_idx = self.freq_idx as usize;
        let chan_cfg = self.chan_cfg as usize;

        Ok([
            0xFF,
            0xF9,
            (((profile - 1) << 6) | (freq_idx << 2) | (chan_cfg >> 2)) as u8,
            (((chan_cfg & 3) << 6) | (frame_len >> 11)) as u8,
            ((frame_len & 0x7FF) >> 3) as u8,
            (((frame_len & 7) << 5) | 0x1F) as u8,
            0xFC,
        ])
    }

    /// Prefix `unit` with a header, consuming it.
    pub fn frame(&self, unit: AccessUnit) -> Result<EncodedFrame, Error> {
        let header = self.encode(unit.data.len())?;
        let mut payload = Vec::with_capacity(ADTS_HEADER_LEN + unit.data.len());
        payload.extend_from_slice(&header);
        payload.extend_from_slice(&unit.data);
        Ok(EncodedFrame {
            payload,
            presentation_timestamp_us: unit.presentation_timestamp_us,
        })
    }

    /// Decode the fixed header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<ParsedAdts, Error> {
        if bytes.len() < ADTS_HEADER_LEN {
            return Err(Error::Framing(format!(
                "need {} header bytes, got {}",
                ADTS_HEADER_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != 0xFF || bytes[1] & 0xF0 != 0xF0 {
            return Err(Error::Framing("missing sync word".to_string()));
        }

        let profile = (bytes[2] >> 6) + 1;
        let freq_idx = (bytes[2] >> 2) & 0x0F;
        let chan_cfg = ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6);
        let frame_len = (((bytes[3] & 0x03) as usize) << 11)
            | ((bytes[4] as usize) << 3)
            | ((bytes[5] >> 5) as usize);

        Ok(ParsedAdts {
            header: AdtsHeader::new(profile, freq_idx, chan_cfg)?,
            frame_len,
        })
    }
}
