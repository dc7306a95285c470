// ABOUTME: Player capability used by the scheduler and drift corrector
// ABOUTME: Narrow load/seek/play/rate interface over whatever renders audio

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track reference value that selects the live feed.
pub const LIVE_TRACK: &str = "live";

/// What a play command asks the player to render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackRef {
    /// A seekable track, by URI
    Uri(String),
    /// The open-ended live feed
    Live,
}

impl TrackRef {
    /// Whether this refers to the live feed
    pub fn is_live(&self) -> bool {
        matches!(self, TrackRef::Live)
    }
}

impl From<String> for TrackRef {
    fn from(value: String) -> Self {
        if value == LIVE_TRACK {
            TrackRef::Live
        } else {
            TrackRef::Uri(value)
        }
    }
}

impl From<&str> for TrackRef {
    fn from(value: &str) -> Self {
        TrackRef::from(value.to_string())
    }
}

impl From<TrackRef> for String {
    fn from(value: TrackRef) -> Self {
        match value {
            TrackRef::Uri(uri) => uri,
            TrackRef::Live => LIVE_TRACK.to_string(),
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRef::Uri(uri) => f.write_str(uri),
            TrackRef::Live => f.write_str(LIVE_TRACK),
        }
    }
}

/// Audio player driven by the sync core.
///
/// Only one owner touches a player at a time; implementations need not be
/// thread-safe beyond `Send`.
pub trait Player: Send {
    /// Prepare `track` for playback. Playback does not start.
    fn load(&mut self, track: &TrackRef) -> Result<(), Error>;

    /// Move the play head to `position_ms`.
    fn seek_to(&mut self, position_ms: i64) -> Result<(), Error>;

    /// Start or resume playback.
    fn play(&mut self) -> Result<(), Error>;

    /// Hold the current position without releasing the track.
    fn pause(&mut self) -> Result<(), Error>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), Error>;

    /// Current play head position in milliseconds.
    fn current_position_ms(&self) -> Result<i64, Error>;

    /// Set the playback rate (1.0 is nominal).
    fn set_rate(&mut self, rate: f64) -> Result<(), Error>;

    /// Rate last applied with [`Player::set_rate`].
    fn rate(&self) -> f64;

    /// Whether audio is currently being rendered.
    fn is_playing(&self) -> bool;
}
