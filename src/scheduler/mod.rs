// ABOUTME: Playback scheduling for synchronized peers
// ABOUTME: Shared session slot and the scheduler that programs the player per command

/// Command scheduling and start deadlines
pub mod playback_scheduler;
/// Atomically replaced session state
pub mod session;

pub use playback_scheduler::{PendingStart, PlaybackCommand, PlaybackScheduler, ScheduleOutcome};
pub use session::{SessionCell, SessionSnapshot, SyncSession};
