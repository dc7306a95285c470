// ABOUTME: Synchronous sync engine owning the player, clock, scheduler and drift corrector
// ABOUTME: Deterministic entry points for commands, start deadlines, drift ticks and clock probes

use crate::audio::player::Player;
use crate::config::SyncConfig;
use crate::error::Error;
use crate::scheduler::playback_scheduler::{
    PendingStart, PlaybackCommand, PlaybackScheduler, ScheduleOutcome,
};
use crate::scheduler::session::SessionCell;
use crate::status::{StatusEvent, StatusReporter};
use crate::sync::clock::{ClockOffset, ClockSync, ReferenceClock, SyncQuality, SystemClock};
use crate::sync::drift::{Correction, DriftCorrector, DriftReport};
use crate::sync::probe::{ProbeReply, ProbeRequest, ProbeTracker};
use parking_lot::Mutex;
use std::sync::Arc;

/// Sync health reported to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// Last measured round trip in microseconds
    pub rtt_micros: Option<i64>,
    /// Current clock offset in microseconds
    pub offset_micros: i64,
    /// Drift measured on the last correcting tick
    pub drift_ms: Option<i64>,
    /// Clock sync quality
    pub quality: SyncQuality,
    /// One of `idle`, `scheduled`, `playing`, `live`
    pub status: &'static str,
}

/// Everything a peer needs to follow the coordinator, driven by the caller.
///
/// The engine never sleeps or spawns. [`crate::controller::SyncController`]
/// calls into it from a single task; tests call it directly.
pub struct SyncEngine<P: Player> {
    player: P,
    clock: ReferenceClock,
    scheduler: PlaybackScheduler,
    corrector: DriftCorrector,
    probes: ProbeTracker,
    status: StatusReporter,
    config: SyncConfig,
    last_drift_ms: Option<i64>,
    adjusting: bool,
    tick_failing: bool,
}

impl<P: Player> SyncEngine<P> {
    /// Engine over `player` reading time from `clock`
    pub fn new(player: P, clock: ReferenceClock, config: SyncConfig, status: StatusReporter) -> Self {
        Self {
            player,
            clock,
            scheduler: PlaybackScheduler::new(SessionCell::new()),
            corrector: config.drift_corrector(),
            probes: ProbeTracker::new(),
            status,
            config,
            last_drift_ms: None,
            adjusting: false,
            tick_failing: false,
        }
    }

    /// Engine over the system clock with an empty offset estimate
    pub fn with_system_clock(player: P, config: SyncConfig, status: StatusReporter) -> Self {
        let sync = ClockSync::with_rtt_floor(config.probe_rtt_floor_micros);
        let clock = ReferenceClock::new(Arc::new(SystemClock), Arc::new(Mutex::new(sync)));
        Self::new(player, clock, config, status)
    }

    /// Apply a coordinator command.
    pub fn handle_command(&mut self, command: &PlaybackCommand) -> Result<ScheduleOutcome, Error> {
        let pausing = matches!(command, PlaybackCommand::Pause { .. });
        if !pausing && self.corrector.is_active() {
            self.deactivate_corrector();
        }

        let reference_now = self.clock.reference_now();
        let outcome = match self.scheduler.schedule(command, reference_now, &mut self.player) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Failed to apply {:?}: {}", command, e);
                self.deactivate_corrector();
                self.status.emit(StatusEvent::PlaybackError(e.to_string()));
                return Err(e);
            }
        };

        match outcome {
            ScheduleOutcome::Armed { wait_ms, .. } => {
                self.status.emit(StatusEvent::Scheduled { wait_ms });
            }
            ScheduleOutcome::Started { .. } => {
                self.corrector.activate();
                self.status.emit(StatusEvent::Playing);
            }
            ScheduleOutcome::LiveStarted { .. } => {
                self.status.emit(StatusEvent::LiveStarted);
            }
            ScheduleOutcome::Paused => {
                self.deactivate_corrector();
                self.status.emit(StatusEvent::Paused);
            }
            ScheduleOutcome::AlreadyPaused => {
                self.deactivate_corrector();
            }
            ScheduleOutcome::Cued { .. } | ScheduleOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    /// Start playback for the armed start tagged `generation`.
    ///
    /// Returns false when that start was cancelled or superseded.
    pub fn fire_start(&mut self, generation: u64) -> Result<bool, Error> {
        match self.scheduler.fire_start(generation, &mut self.player) {
            Ok(true) => {
                self.corrector.activate();
                self.status.emit(StatusEvent::Playing);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                log::error!("Scheduled start failed: {}", e);
                self.status.emit(StatusEvent::PlaybackError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Run one drift correction tick. Errors are logged and end only this tick.
    pub fn drift_tick(&mut self) -> Option<DriftReport> {
        let report = match self
            .corrector
            .tick(self.scheduler.session(), &self.clock, &mut self.player)
        {
            Ok(report) => {
                self.tick_failing = false;
                report?
            }
            Err(e) => {
                log::warn!("Drift tick failed: {}", e);
                if !self.tick_failing {
                    self.tick_failing = true;
                    self.status.emit(StatusEvent::PlaybackError(e.to_string()));
                }
                return None;
            }
        };

        self.last_drift_ms = Some(report.drift_ms);
        match report.correction {
            Correction::Hard { .. } => {
                self.adjusting = false;
                self.status.emit(StatusEvent::Resyncing {
                    drift_ms: report.drift_ms,
                });
            }
            Correction::Soft { rate } => {
                if !self.adjusting {
                    self.adjusting = true;
                    self.status.emit(StatusEvent::Adjusting { rate });
                }
            }
            Correction::Nominal { .. } => {
                if self.adjusting {
                    self.adjusting = false;
                    self.status.emit(StatusEvent::Playing);
                }
            }
        }
        Some(report)
    }

    /// Tag a new clock probe sent now.
    pub fn begin_probe(&mut self) -> ProbeRequest {
        self.probes.begin(self.clock.local_now())
    }

    /// Feed a probe reply received now into the offset estimate
    pub fn handle_probe_reply(&mut self, reply: ProbeReply) -> Option<ClockOffset> {
        let local_now = self.clock.local_now();
        let mut sync = self.clock.clock_sync().lock();
        let measured = self.probes.complete(reply, local_now, &mut sync);
        match measured {
            Some(m) => log::debug!("Clock offset {}us, rtt {}us", m.offset, m.rtt),
            None => log::debug!("Probe reply {} not used", reply.seq),
        }
        measured
    }

    /// Abandon probes older than the probe timeout. The offset is kept.
    pub fn expire_probes(&mut self) -> usize {
        let timeout_micros = self.config.probe_timeout.as_micros() as i64;
        self.probes.expire(self.clock.local_now(), timeout_micros)
    }

    /// Current sync health
    pub fn telemetry(&self) -> Telemetry {
        let sync = self.clock.clock_sync().lock();
        let status = match self.scheduler.session().current() {
            None => "idle",
            Some(s) if s.track.is_live() => "live",
            Some(s) if s.is_active => "playing",
            Some(_) => "scheduled",
        };
        Telemetry {
            rtt_micros: sync.rtt_micros(),
            offset_micros: sync.offset_micros(),
            drift_ms: self.last_drift_ms,
            quality: sync.quality(),
            status,
        }
    }

    /// Stop playback and clear the session as a Pause would.
    pub fn stop(&mut self) -> Result<(), Error> {
        let reference_time = self.clock.reference_now();
        self.handle_command(&PlaybackCommand::Pause { reference_time })
            .map(|_| ())
    }

    /// Start waiting for its deadline, if any
    pub fn pending_start(&self) -> Option<PendingStart> {
        self.scheduler.pending_start()
    }

    /// Session slot shared with the drift corrector
    pub fn session(&self) -> &SessionCell {
        self.scheduler.session()
    }

    /// Clock used for scheduling
    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether drift ticks currently correct
    pub fn is_correcting(&self) -> bool {
        self.corrector.is_active()
    }

    /// The driven player
    pub fn player(&self) -> &P {
        &self.player
    }

    /// The driven player, mutably
    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    fn deactivate_corrector(&mut self) {
        self.adjusting = false;
        self.last_drift_ms = None;
        if let Err(e) = self.corrector.deactivate(&mut self.player) {
            log::warn!("Failed to reset playback rate: {}", e);
        }
    }
}
