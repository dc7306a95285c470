// ABOUTME: Playback scheduler turning coordinator commands into player state
// ABOUTME: Arms a start deadline for early commands, joins mid-stream for late ones

use crate::audio::player::{Player, TrackRef};
use crate::error::Error;
use crate::scheduler::session::{SessionCell, SyncSession};

/// Command received from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Play `track` so that `start_position_ms` is heard at `reference_start_time`.
    Play {
        /// Track to play, or the live feed
        track: TrackRef,
        /// Reference-clock microseconds
        reference_start_time: i64,
        /// Track position in milliseconds
        start_position_ms: i64,
    },
    /// Stop playback immediately. The time is informational.
    Pause {
        /// Reference-clock microseconds when the pause was issued
        reference_time: i64,
    },
    /// Move the current track to a new position.
    SeekTo {
        /// Reference-clock microseconds
        reference_start_time: i64,
        /// Track position in milliseconds
        start_position_ms: i64,
    },
}

/// Start waiting for its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStart {
    /// Generation of the session this start belongs to
    pub generation: u64,
    /// Delay from scheduling until playback starts
    pub wait_ms: i64,
}

/// What [`PlaybackScheduler::schedule`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Track loaded and cued; playback starts when the deadline fires.
    Armed {
        /// Session generation
        generation: u64,
        /// Deadline in milliseconds from now
        wait_ms: i64,
    },
    /// Start time already passed; playing from the catch-up position.
    Started {
        /// Session generation
        generation: u64,
        /// Position playback started from
        position_ms: i64,
    },
    /// Live feed loaded and playing.
    LiveStarted {
        /// Session generation
        generation: u64,
    },
    /// Playback stopped and session cleared.
    Paused,
    /// Nothing was playing or pending.
    AlreadyPaused,
    /// No session; the paused player was moved to the position.
    Cued {
        /// New position
        position_ms: i64,
    },
    /// Command has no meaning in the current state.
    Ignored,
}

/// Computes local deadlines and programs the player for each command.
pub struct PlaybackScheduler {
    session: SessionCell,
    pending: Option<PendingStart>,
}

impl PlaybackScheduler {
    /// Create a scheduler writing into `session`
    pub fn new(session: SessionCell) -> Self {
        Self {
            session,
            pending: None,
        }
    }

    /// Session slot shared with the drift corrector
    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    /// Start waiting for its deadline, if any
    pub fn pending_start(&self) -> Option<PendingStart> {
        self.pending
    }

    /// Drop the pending start. Returns true if there was one.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Apply `command` given the current reference time.
    pub fn schedule<P: Player + ?Sized>(
        &mut self,
        command: &PlaybackCommand,
        reference_now: i64,
        player: &mut P,
    ) -> Result<ScheduleOutcome, Error> {
        match command {
            PlaybackCommand::Play {
                track: TrackRef::Live,
                reference_start_time,
                start_position_ms,
            } => self.start_live(*reference_start_time, *start_position_ms, player),
            PlaybackCommand::Play {
                track,
                reference_start_time,
                start_position_ms,
            } => self.schedule_track(
                track.clone(),
                *reference_start_time,
                *start_position_ms,
                reference_now,
                player,
            ),
            PlaybackCommand::Pause { .. } => self.pause(player),
            PlaybackCommand::SeekTo {
                reference_start_time,
                start_position_ms,
            } => match self.session.current() {
                Some(current) if current.track.is_live() => Ok(ScheduleOutcome::Ignored),
                Some(current) => self.schedule_track(
                    current.track,
                    *reference_start_time,
                    *start_position_ms,
                    reference_now,
                    player,
                ),
                None => {
                    player.seek_to(*start_position_ms)?;
                    Ok(ScheduleOutcome::Cued {
                        position_ms: *start_position_ms,
                    })
                }
            },
        }
    }

    /// Start playback for the pending start tagged `generation`.
    ///
    /// Returns false when that start was cancelled or superseded.
    pub fn fire_start<P: Player + ?Sized>(
        &mut self,
        generation: u64,
        player: &mut P,
    ) -> Result<bool, Error> {
        match self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
            }
            _ => return Ok(false),
        }
        if !self.session.is_current(generation) {
            return Ok(false);
        }

        if let Err(e) = player.play() {
            self.session.clear();
            return Err(e);
        }
        self.session.activate(generation);
        log::info!("Scheduled start reached, playback started");
        Ok(true)
    }

    fn schedule_track<P: Player + ?Sized>(
        &mut self,
        track: TrackRef,
        reference_start_time: i64,
        start_position_ms: i64,
        reference_now: i64,
        player: &mut P,
    ) -> Result<ScheduleOutcome, Error> {
        self.cancel_pending();

        let wait_ms = (reference_start_time - reference_now) / 1000;
        let mut session = SyncSession {
            track,
            reference_start_time,
            start_position_ms,
            is_active: false,
        };

        if wait_ms > 0 {
            let generation = self.session.replace(session.clone());
            if let Err(e) = cue(player, &session.track, start_position_ms) {
                self.session.clear();
                return Err(e);
            }

            self.pending = Some(PendingStart {
                generation,
                wait_ms,
            });
            log::info!(
                "Armed start of {} at {}ms in {}ms",
                session.track,
                start_position_ms,
                wait_ms
            );
            return Ok(ScheduleOutcome::Armed {
                generation,
                wait_ms,
            });
        }

        let position_ms = session.expected_position_ms(reference_now);
        session.is_active = true;
        let generation = self.session.replace(session.clone());
        let programmed = player
            .load(&session.track)
            .and_then(|_| player.seek_to(position_ms))
            .and_then(|_| player.play());
        if let Err(e) = programmed {
            self.session.clear();
            return Err(e);
        }

        log::info!(
            "Joined {} late by {}ms, playing from {}ms",
            session.track,
            position_ms - start_position_ms,
            position_ms
        );
        Ok(ScheduleOutcome::Started {
            generation,
            position_ms,
        })
    }

    fn start_live<P: Player + ?Sized>(
        &mut self,
        reference_start_time: i64,
        start_position_ms: i64,
        player: &mut P,
    ) -> Result<ScheduleOutcome, Error> {
        self.cancel_pending();

        let generation = self.session.replace(SyncSession {
            track: TrackRef::Live,
            reference_start_time,
            start_position_ms,
            is_active: true,
        });
        if let Err(e) = player.load(&TrackRef::Live).and_then(|_| player.play()) {
            self.session.clear();
            return Err(e);
        }

        log::info!("Live stream started");
        Ok(ScheduleOutcome::LiveStarted { generation })
    }

    fn pause<P: Player + ?Sized>(&mut self, player: &mut P) -> Result<ScheduleOutcome, Error> {
        let had_pending = self.cancel_pending();
        let had_session = self.session.clear();

        if !had_pending && !had_session && !player.is_playing() {
            return Ok(ScheduleOutcome::AlreadyPaused);
        }

        player.stop()?;
        log::info!("Playback paused");
        Ok(ScheduleOutcome::Paused)
    }
}

/// Load `track` paused at `position_ms`.
fn cue<P: Player + ?Sized>(player: &mut P, track: &TrackRef, position_ms: i64) -> Result<(), Error> {
    if player.is_playing() {
        player.pause()?;
    }
    player.load(track)?;
    player.seek_to(position_ms)
}
