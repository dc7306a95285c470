// ABOUTME: Active synchronized-playback session
// ABOUTME: Snapshot value replaced as a whole, tagged with a generation counter

use crate::audio::player::TrackRef;
use parking_lot::RwLock;
use std::sync::Arc;

/// Parameters of the session currently being played in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    /// Track being played
    pub track: TrackRef,
    /// Reference time (µs) at which `start_position_ms` plays
    pub reference_start_time: i64,
    /// Track position (ms) at `reference_start_time`
    pub start_position_ms: i64,
    /// Cleared while a start is still pending
    pub is_active: bool,
}

impl SyncSession {
    /// Position the track should be at when the reference clock reads `reference_now`.
    ///
    /// Start time and start position always come from the same snapshot.
    pub fn expected_position_ms(&self, reference_now: i64) -> i64 {
        self.start_position_ms + (reference_now - self.reference_start_time) / 1000
    }
}

/// A session together with the generation it was installed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Incremented on every replace and clear
    pub generation: u64,
    /// The session, if any
    pub session: Option<SyncSession>,
}

/// Shared slot holding at most one session.
///
/// Writers replace the whole snapshot under one lock, so readers never see
/// a start time from one session paired with a position from another.
#[derive(Debug, Clone)]
pub struct SessionCell {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SessionCell {
    /// Create an empty cell
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionSnapshot {
                generation: 0,
                session: None,
            })),
        }
    }

    /// Install `session`, superseding any previous one. Returns its generation.
    pub fn replace(&self, session: SyncSession) -> u64 {
        let mut slot = self.inner.write();
        slot.generation = slot.generation.wrapping_add(1);
        slot.session = Some(session);
        slot.generation
    }

    /// Mark the session installed under `generation` as active.
    ///
    /// Returns false if it has been superseded in the meantime.
    pub fn activate(&self, generation: u64) -> bool {
        let mut slot = self.inner.write();
        if slot.generation != generation {
            return false;
        }
        match slot.session.as_mut() {
            Some(session) => {
                session.is_active = true;
                true
            }
            None => false,
        }
    }

    /// Remove the session. Returns true if there was one.
    pub fn clear(&self) -> bool {
        let mut slot = self.inner.write();
        let had_session = slot.session.take().is_some();
        if had_session {
            slot.generation = slot.generation.wrapping_add(1);
        }
        had_session
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().clone()
    }

    /// Current session, if any
    pub fn current(&self) -> Option<SyncSession> {
        self.inner.read().session.clone()
    }

    /// Whether `generation` still identifies the installed session
    pub fn is_current(&self, generation: u64) -> bool {
        let slot = self.inner.read();
        slot.generation == generation && slot.session.is_some()
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
