// ABOUTME: Continuous drift correction for an active sync session
// ABOUTME: Compares actual and expected position each tick and seeks or bends playback rate

use crate::audio::player::Player;
use crate::error::Error;
use crate::scheduler::session::SessionCell;
use crate::sync::clock::ReferenceClock;
use crate::sync::correction::{CorrectionBand, CorrectionPlanner, RateController};
use std::time::Duration;

/// Correction applied on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Within tolerance. `reset_rate` is true if the rate had to be put back to 1.0.
    Nominal {
        /// Whether the player rate was changed
        reset_rate: bool,
    },
    /// Playback rate bent towards the schedule.
    Soft {
        /// Rate applied
        rate: f64,
    },
    /// Player seeked to the expected position.
    Hard {
        /// Seek target in milliseconds
        seek_to_ms: i64,
    },
}

/// Measurement and action of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftReport {
    /// Session generation the tick was computed for
    pub generation: u64,
    /// Where the schedule says the player should be
    pub expected_position_ms: i64,
    /// Where the player reported it is
    pub actual_position_ms: i64,
    /// `actual - expected`; positive means ahead
    pub drift_ms: i64,
    /// What was done about it
    pub correction: Correction,
}

/// Periodic corrector keeping a playing peer on schedule.
pub struct DriftCorrector {
    planner: CorrectionPlanner,
    rate: RateController,
    tick_interval: Duration,
    active: bool,
}

impl DriftCorrector {
    /// Create an inactive corrector.
    pub fn new(planner: CorrectionPlanner, rate: RateController, tick_interval: Duration) -> Self {
        Self {
            planner,
            rate,
            tick_interval,
            active: false,
        }
    }

    /// Interval between ticks
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Whether ticks currently apply corrections
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start correcting.
    pub fn activate(&mut self) {
        self.active = true;
        self.rate.reset();
    }

    /// Stop correcting and put the player back to rate 1.0.
    pub fn deactivate<P: Player + ?Sized>(&mut self, player: &mut P) -> Result<(), Error> {
        self.active = false;
        self.rate.reset();
        player.set_rate(1.0)
    }

    /// Evaluate drift once and apply the matching correction.
    ///
    /// Returns `Ok(None)` when there is nothing to correct: inactive
    /// corrector, no active session, live session, or player not playing.
    pub fn tick<P: Player + ?Sized>(
        &mut self,
        session: &SessionCell,
        clock: &ReferenceClock,
        player: &mut P,
    ) -> Result<Option<DriftReport>, Error> {
        if !self.active {
            return Ok(None);
        }
        let snapshot = session.snapshot();
        let current = match snapshot.session {
            Some(ref s) if s.is_active && !s.track.is_live() => s,
            _ => return Ok(None),
        };
        if !player.is_playing() {
            return Ok(None);
        }

        let reading = clock.sample();
        let actual_position_ms = player.current_position_ms()?;
        let expected_position_ms = current.expected_position_ms(reading.reference_micros());
        let drift_ms = actual_position_ms - expected_position_ms;

        // Session may have been replaced while we were reading the player
        if !session.is_current(snapshot.generation) {
            return Ok(None);
        }

        let correction = match self.planner.plan(drift_ms) {
            CorrectionBand::Hard => {
                player.seek_to(expected_position_ms)?;
                player.set_rate(1.0)?;
                self.rate.reset();
                log::warn!("Hard resync: drift {}ms", drift_ms);
                Correction::Hard {
                    seek_to_ms: expected_position_ms,
                }
            }
            CorrectionBand::Soft => {
                let rate = self
                    .rate
                    .next_rate(drift_ms as f64, self.tick_interval.as_secs_f64());
                player.set_rate(rate)?;
                log::debug!("Drift {}ms -> rate {:.4}", drift_ms, rate);
                Correction::Soft { rate }
            }
            CorrectionBand::Nominal => {
                self.rate.reset();
                let reset_rate = player.rate() != 1.0;
                if reset_rate {
                    player.set_rate(1.0)?;
                }
                Correction::Nominal { reset_rate }
            }
        };

        Ok(Some(DriftReport {
            generation: snapshot.generation,
            expected_position_ms,
            actual_position_ms,
            drift_ms,
            correction,
        }))
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(
            CorrectionPlanner::new(),
            RateController::default(),
            Duration::from_millis(100),
        )
    }
}
