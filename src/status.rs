// ABOUTME: Status events surfaced to whatever UI hosts the peer
// ABOUTME: One terse event per state transition, delivered over an unbounded channel

use std::fmt;
use tokio::sync::mpsc;

/// State transition worth showing to a user.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Start armed for later
    Scheduled {
        /// Milliseconds until playback starts
        wait_ms: i64,
    },
    /// Playback running in sync
    Playing,
    /// Live feed playing
    LiveStarted,
    /// Playback stopped
    Paused,
    /// Hard resync applied
    Resyncing {
        /// Drift that triggered it
        drift_ms: i64,
    },
    /// Playback rate bent to catch up or slow down
    Adjusting {
        /// Rate applied
        rate: f64,
    },
    /// Player or scheduling failure
    PlaybackError(String),
    /// Live capture running
    CaptureStarted,
    /// Live capture stopped
    CaptureStopped,
    /// Live capture could not start
    CaptureFailed(String),
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Scheduled { wait_ms } => write!(f, "starting in {}ms", wait_ms),
            StatusEvent::Playing => f.write_str("playing"),
            StatusEvent::LiveStarted => f.write_str("playing live"),
            StatusEvent::Paused => f.write_str("paused"),
            StatusEvent::Resyncing { .. } => f.write_str("resyncing"),
            StatusEvent::Adjusting { .. } => f.write_str("adjusting"),
            StatusEvent::PlaybackError(_) => f.write_str("playback error"),
            StatusEvent::CaptureStarted => f.write_str("live capture on"),
            StatusEvent::CaptureStopped => f.write_str("live capture off"),
            StatusEvent::CaptureFailed(_) => f.write_str("live capture failed"),
        }
    }
}

/// Sends status events if anyone is listening.
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusReporter {
    /// Reporter that drops every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Reporter and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Deliver `event`. A closed receiver is ignored.
    pub fn emit(&self, event: StatusEvent) {
        log::debug!("status: {}", event);
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
