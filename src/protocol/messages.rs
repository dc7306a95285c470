// ABOUTME: Control channel message types and binary audio chunk framing
// ABOUTME: JSON envelope {"type", "payload"} plus conversions into engine commands

use crate::audio::encode::EncodedFrame;
use crate::audio::player::TrackRef;
use crate::controller::ControlEvent;
use crate::engine::Telemetry;
use crate::error::Error;
use crate::scheduler::playback_scheduler::PlaybackCommand;
use crate::sync::clock::SyncQuality;
use crate::sync::probe::{ProbeReply, ProbeRequest};
use serde::{Deserialize, Serialize};

/// Binary message type byte for encoded audio.
pub const AUDIO_CHUNK_TYPE: u8 = 0x04;

const AUDIO_CHUNK_HEADER_LEN: usize = 9;

/// Every message on the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    /// Peer → coordinator: join the group
    #[serde(rename = "client/join")]
    ClientJoin(ClientJoin),
    /// Coordinator → peer: join accepted
    #[serde(rename = "server/welcome")]
    ServerWelcome(ServerWelcome),
    /// Peer → coordinator: clock probe
    #[serde(rename = "client/time")]
    ClientTime(ClientTime),
    /// Coordinator → peer: clock probe reply
    #[serde(rename = "server/time")]
    ServerTime(ServerTime),
    /// Coordinator → peer: play at a reference time
    #[serde(rename = "server/play")]
    ServerPlay(ServerPlay),
    /// Coordinator → peer: stop now
    #[serde(rename = "server/pause")]
    ServerPause(ServerPause),
    /// Coordinator → peer: move the current track
    #[serde(rename = "server/seek")]
    ServerSeek(ServerSeek),
    /// Coordinator → peer: probe the clock immediately
    #[serde(rename = "server/sync_required")]
    ServerSyncRequired,
    /// Peer → coordinator: sync health
    #[serde(rename = "client/telemetry")]
    ClientTelemetry(ClientTelemetry),
    /// Peer → coordinator: ask for a track to be played
    #[serde(rename = "client/play_request")]
    ClientPlayRequest(ClientPlayRequest),
    /// Peer → coordinator: ask for play, pause or seek on the current track
    #[serde(rename = "client/command_request")]
    ClientCommandRequest(RequestedCommand),
}

impl Message {
    /// Engine input carried by this message, if any
    pub fn into_control_event(self) -> Option<ControlEvent> {
        match self {
            Message::ServerPlay(play) => Some(ControlEvent::Command(play.into())),
            Message::ServerPause(pause) => Some(ControlEvent::Command(pause.into())),
            Message::ServerSeek(seek) => Some(ControlEvent::Command(seek.into())),
            Message::ServerTime(time) => Some(ControlEvent::ProbeReply(time.into())),
            Message::ServerSyncRequired => Some(ControlEvent::SyncRequired),
            _ => None,
        }
    }
}

/// Device description sent on join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Product name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Manufacturer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Software version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

/// Join handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientJoin {
    /// Stable per-device id
    pub device_id: String,
    /// Human readable name
    pub name: String,
    /// Protocol version
    pub version: u32,
    /// Roles such as `player@v1` or `source@v1`
    pub supported_roles: Vec<String>,
    /// Device description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
}

/// Join accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerWelcome {
    /// Session assigned to this peer
    pub session_id: String,
    /// Coordinator display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

/// Clock probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTime {
    /// Probe tag
    pub seq: u32,
    /// Local send time, microseconds
    pub client_transmitted: i64,
}

impl From<ProbeRequest> for ClientTime {
    fn from(request: ProbeRequest) -> Self {
        Self {
            seq: request.seq,
            client_transmitted: request.client_transmitted,
        }
    }
}

/// Clock probe reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    /// Tag of the answered probe
    pub seq: u32,
    /// Echo of the probe send time
    pub client_transmitted: i64,
    /// Reference receive time, microseconds
    pub server_received: i64,
    /// Reference transmit time, microseconds
    pub server_transmitted: i64,
}

impl From<ServerTime> for ProbeReply {
    fn from(time: ServerTime) -> Self {
        Self {
            seq: time.seq,
            reference_received: time.server_received,
            reference_transmitted: time.server_transmitted,
        }
    }
}

/// Play command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPlay {
    /// Track URI or `live`
    pub track: TrackRef,
    /// Reference time at which `start_at_position_ms` should be heard
    pub start_at_server_time: i64,
    /// Track position in milliseconds
    pub start_at_position_ms: i64,
    /// Reference time the command was sent, informational
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time_at_broadcast: Option<i64>,
}

impl From<ServerPlay> for PlaybackCommand {
    fn from(play: ServerPlay) -> Self {
        PlaybackCommand::Play {
            track: play.track,
            reference_start_time: play.start_at_server_time,
            start_position_ms: play.start_at_position_ms,
        }
    }
}

/// Pause command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPause {
    /// Reference time of the pause, informational
    pub server_time: i64,
}

impl From<ServerPause> for PlaybackCommand {
    fn from(pause: ServerPause) -> Self {
        PlaybackCommand::Pause {
            reference_time: pause.server_time,
        }
    }
}

/// Seek command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSeek {
    /// Reference time at which the new position should be heard
    pub start_at_server_time: i64,
    /// New track position in milliseconds
    pub start_at_position_ms: i64,
}

impl From<ServerSeek> for PlaybackCommand {
    fn from(seek: ServerSeek) -> Self {
        PlaybackCommand::SeekTo {
            reference_start_time: seek.start_at_server_time,
            start_position_ms: seek.start_at_position_ms,
        }
    }
}

/// Clock sync quality as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncQualityReport {
    /// RTT under 50ms
    Good,
    /// RTT under 100ms
    Degraded,
    /// No usable sample
    Lost,
}

impl From<SyncQuality> for SyncQualityReport {
    fn from(quality: SyncQuality) -> Self {
        match quality {
            SyncQuality::Good => SyncQualityReport::Good,
            SyncQuality::Degraded => SyncQualityReport::Degraded,
            SyncQuality::Lost => SyncQualityReport::Lost,
        }
    }
}

/// Sync health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientTelemetry {
    /// Last measured round trip, microseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_us: Option<i64>,
    /// Clock offset, microseconds
    pub offset_us: i64,
    /// Last measured drift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_ms: Option<i64>,
    /// Clock sync quality
    pub quality: SyncQualityReport,
    /// Playback state
    pub status: String,
}

impl From<&Telemetry> for ClientTelemetry {
    fn from(t: &Telemetry) -> Self {
        Self {
            rtt_us: t.rtt_micros,
            offset_us: t.offset_micros,
            drift_ms: t.drift_ms,
            quality: t.quality.into(),
            status: t.status.to_string(),
        }
    }
}

/// Ask the coordinator to play a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPlayRequest {
    /// Track to play
    pub track: TrackRef,
    /// Delay the coordinator should leave before the start
    pub delay_ms: u64,
    /// Position to start from
    #[serde(default)]
    pub start_position_ms: i64,
}

/// Transport command a peer asks the coordinator to broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum RequestedCommand {
    /// Resume the current track
    Play {
        /// Position to start from
        start_position_ms: i64,
        /// Delay the coordinator should leave before the start
        delay_ms: u64,
    },
    /// Pause everyone
    Pause,
    /// Move the current track
    Seek {
        /// New position
        position_ms: i64,
    },
}

/// Encoded audio carried in a binary WebSocket message.
///
/// Layout: type byte `0x04`, presentation timestamp as big-endian i64
/// microseconds, then one ADTS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// ADTS frame
    pub data: Vec<u8>,
}

impl AudioChunk {
    /// Serialize for a binary message
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AUDIO_CHUNK_HEADER_LEN + self.data.len());
        out.push(AUDIO_CHUNK_TYPE);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse a binary message
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < AUDIO_CHUNK_HEADER_LEN {
            return Err(Error::Protocol(format!(
                "audio chunk too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != AUDIO_CHUNK_TYPE {
            return Err(Error::Protocol(format!(
                "unexpected binary message type {:#04x}",
                bytes[0]
            )));
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[1..AUDIO_CHUNK_HEADER_LEN]);
        Ok(Self {
            timestamp: i64::from_be_bytes(ts),
            data: bytes[AUDIO_CHUNK_HEADER_LEN..].to_vec(),
        })
    }
}

impl From<EncodedFrame> for AudioChunk {
    fn from(frame: EncodedFrame) -> Self {
        Self {
            timestamp: frame.presentation_timestamp_us,
            data: frame.payload,
        }
    }
}
