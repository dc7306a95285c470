// ABOUTME: Async controller running the sync engine on a single tokio timeline
// ABOUTME: Serializes coordinator events, the start deadline, drift ticks and clock probes

use crate::audio::player::Player;
use crate::engine::{SyncEngine, Telemetry};
use crate::error::Error;
use crate::scheduler::playback_scheduler::{PlaybackCommand, ScheduleOutcome};
use crate::sync::probe::{ProbeReply, ProbeRequest};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Input to the controller, processed in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Coordinator playback command
    Command(PlaybackCommand),
    /// Answer to an earlier clock probe
    ProbeReply(ProbeReply),
    /// Coordinator asks for an immediate clock probe
    SyncRequired,
    /// Stop playback and end the controller
    Shutdown,
}

/// Outbound side of the control channel.
pub trait ControlTransport: Send {
    /// Send a clock probe request
    fn send_probe(&mut self, request: ProbeRequest) -> Result<(), Error>;

    /// Report sync health to the coordinator
    fn send_telemetry(&mut self, telemetry: &Telemetry) -> Result<(), Error>;
}

/// Drives a [`SyncEngine`] from timers and coordinator events.
pub struct SyncController<P: Player, T: ControlTransport> {
    engine: SyncEngine<P>,
    transport: T,
    events: mpsc::Receiver<ControlEvent>,
    deadline: Option<(Instant, u64)>,
}

impl<P, T> SyncController<P, T>
where
    P: Player + 'static,
    T: ControlTransport + 'static,
{
    /// Create a controller fed by `events`
    pub fn new(engine: SyncEngine<P>, transport: T, events: mpsc::Receiver<ControlEvent>) -> Self {
        Self {
            engine,
            transport,
            events,
            deadline: None,
        }
    }

    /// Run on a new task. The engine is handed back when the controller ends.
    pub fn spawn(self) -> JoinHandle<SyncEngine<P>> {
        tokio::spawn(self.run())
    }

    /// Process events and timers until shutdown or until the event channel closes.
    pub async fn run(mut self) -> SyncEngine<P> {
        let config = self.engine.config().clone();
        let mut drift = time::interval(config.drift_tick);
        drift.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probe = time::interval(config.probe_interval);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First probe comes from the regular interval, the rest of the burst follows
        let mut burst_left = config.probe_burst.saturating_sub(1);
        let mut burst = time::interval_at(
            Instant::now() + config.probe_burst_spacing,
            config.probe_burst_spacing,
        );
        burst.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.deadline;
            let start_due = async move {
                match deadline {
                    Some((at, _)) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ControlEvent::Command(command)) => self.on_command(&command),
                    Some(ControlEvent::ProbeReply(reply)) => {
                        self.engine.handle_probe_reply(reply);
                    }
                    Some(ControlEvent::SyncRequired) => {
                        log::debug!("Coordinator requested sync");
                        self.probe_now();
                    }
                    Some(ControlEvent::Shutdown) | None => break,
                },
                _ = start_due => {
                    if let Some((_, generation)) = self.deadline.take() {
                        if let Err(e) = self.engine.fire_start(generation) {
                            log::warn!("Start for session {} failed: {}", generation, e);
                        }
                    }
                }
                _ = drift.tick() => {
                    self.engine.drift_tick();
                }
                _ = burst.tick(), if burst_left > 0 => {
                    burst_left -= 1;
                    self.probe_now();
                }
                _ = probe.tick() => {
                    self.engine.expire_probes();
                    self.probe_now();
                    let telemetry = self.engine.telemetry();
                    if let Err(e) = self.transport.send_telemetry(&telemetry) {
                        log::warn!("Failed to send telemetry: {}", e);
                    }
                }
            }
        }

        if let Err(e) = self.engine.stop() {
            log::warn!("Failed to stop playback on shutdown: {}", e);
        }
        log::info!("Sync controller stopped");
        self.engine
    }

    fn on_command(&mut self, command: &PlaybackCommand) {
        match self.engine.handle_command(command) {
            Ok(ScheduleOutcome::Armed {
                generation,
                wait_ms,
            }) => {
                let at = Instant::now() + Duration::from_millis(wait_ms.max(0) as u64);
                self.deadline = Some((at, generation));
            }
            Ok(_) => {
                if self.engine.pending_start().is_none() {
                    self.deadline = None;
                }
            }
            Err(e) => {
                log::warn!("Command failed: {}", e);
                self.deadline = None;
            }
        }
    }

    fn probe_now(&mut self) {
        let request = self.engine.begin_probe();
        if let Err(e) = self.transport.send_probe(request) {
            log::warn!("Failed to send clock probe: {}", e);
        }
    }
}
