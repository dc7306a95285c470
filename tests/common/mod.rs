// ABOUTME: Deterministic fakes shared by the integration tests
// ABOUTME: Recording player, scripted capture source and encoder, collecting frame sink

#![allow(dead_code)]

use parking_lot::Mutex;
use peersync::audio::{
    AccessUnit, CaptureSource, EncodedFrame, EncoderConfig, FrameEncoder, FrameSink, PcmFormat,
    Player, TrackRef,
};
use peersync::Error;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Player operation as seen by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Load(TrackRef),
    Seek(i64),
    Play,
    Pause,
    Stop,
    SetRate(f64),
}

#[derive(Debug)]
pub struct PlayerState {
    pub calls: Vec<PlayerCall>,
    pub playing: bool,
    pub position_ms: i64,
    pub rate: f64,
    pub fail_position: bool,
    pub fail_play: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            playing: false,
            position_ms: 0,
            rate: 1.0,
            fail_position: false,
            fail_play: false,
        }
    }
}

/// Player recording every call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakePlayer {
    pub state: Arc<Mutex<PlayerState>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Player already playing `position_ms`
    pub fn playing_at(position_ms: i64) -> Self {
        let player = Self::new();
        {
            let mut state = player.state.lock();
            state.playing = true;
            state.position_ms = position_ms;
        }
        player
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn seeks(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlayerCall::Seek(ms) => Some(ms),
                _ => None,
            })
            .collect()
    }

    pub fn set_position(&self, position_ms: i64) {
        self.state.lock().position_ms = position_ms;
    }

    pub fn is_playing_now(&self) -> bool {
        self.state.lock().playing
    }

    pub fn current_rate(&self) -> f64 {
        self.state.lock().rate
    }
}

impl Player for FakePlayer {
    fn load(&mut self, track: &TrackRef) -> Result<(), Error> {
        self.state.lock().calls.push(PlayerCall::Load(track.clone()));
        Ok(())
    }

    fn seek_to(&mut self, position_ms: i64) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Seek(position_ms));
        state.position_ms = position_ms;
        Ok(())
    }

    fn play(&mut self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Play);
        if state.fail_play {
            return Err(Error::Player("renderer gone".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Pause);
        state.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::Stop);
        state.playing = false;
        Ok(())
    }

    fn current_position_ms(&self) -> Result<i64, Error> {
        let state = self.state.lock();
        if state.fail_position {
            return Err(Error::Player("position unavailable".to_string()));
        }
        Ok(state.position_ms)
    }

    fn set_rate(&mut self, rate: f64) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.calls.push(PlayerCall::SetRate(rate));
        state.rate = rate;
        Ok(())
    }

    fn rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }
}

/// Ordered log of resource acquire/release events across fakes.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Capture source returning scripted chunks, then nothing.
pub struct ScriptedCapture {
    chunks: VecDeque<Vec<u8>>,
    events: EventLog,
    pub fail_start: bool,
    pub fail_stop: bool,
}

impl ScriptedCapture {
    pub fn new(chunks: Vec<Vec<u8>>, events: EventLog) -> Self {
        Self {
            chunks: chunks.into(),
            events,
            fail_start: false,
            fail_stop: false,
        }
    }
}

impl CaptureSource for ScriptedCapture {
    fn start(&mut self, _format: &PcmFormat, _buffer_bytes: usize) -> Result<(), Error> {
        if self.fail_start {
            return Err(Error::Capture("no input device".to_string()));
        }
        self.events.lock().push("capture.start");
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
        }
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.events.lock().push("capture.stop");
        if self.fail_stop {
            return Err(Error::Capture("device busy".to_string()));
        }
        Ok(())
    }
}

/// Counts capture sources held open and reads attempted. Clones share counts.
#[derive(Debug, Clone, Default)]
pub struct CaptureGauge {
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl CaptureGauge {
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Source whose every read blocks for `delay` before returning a full chunk.
pub struct SlowCapture {
    delay: Duration,
    gauge: CaptureGauge,
}

impl SlowCapture {
    pub fn new(delay: Duration, gauge: CaptureGauge) -> Self {
        Self { delay, gauge }
    }
}

impl CaptureSource for SlowCapture {
    fn start(&mut self, _format: &PcmFormat, _buffer_bytes: usize) -> Result<(), Error> {
        self.gauge.opened();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.gauge.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        buf.fill(0x11);
        Ok(buf.len())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.gauge.closed();
        Ok(())
    }
}

/// Source whose reads always fail.
pub struct FailingCapture {
    gauge: CaptureGauge,
}

impl FailingCapture {
    pub fn new(gauge: CaptureGauge) -> Self {
        Self { gauge }
    }
}

impl CaptureSource for FailingCapture {
    fn start(&mut self, _format: &PcmFormat, _buffer_bytes: usize) -> Result<(), Error> {
        self.gauge.opened();
        Ok(())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Error> {
        self.gauge.reads.fetch_add(1, Ordering::SeqCst);
        Err(Error::Capture("device unplugged".to_string()))
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.gauge.closed();
        Ok(())
    }
}

/// Encoder emitting `outputs_per_input` units per accepted chunk.
///
/// `accept` is consumed one entry per submission; once empty every
/// submission is accepted.
pub struct ScriptedEncoder {
    pub accept: VecDeque<bool>,
    pub outputs_per_input: usize,
    pub fail_start: bool,
    pending: VecDeque<AccessUnit>,
    events: EventLog,
    next_unit: u8,
}

impl ScriptedEncoder {
    pub fn new(outputs_per_input: usize, events: EventLog) -> Self {
        Self {
            accept: VecDeque::new(),
            outputs_per_input,
            fail_start: false,
            pending: VecDeque::new(),
            events,
            next_unit: 0,
        }
    }
}

impl FrameEncoder for ScriptedEncoder {
    fn start(&mut self, _config: &EncoderConfig) -> Result<(), Error> {
        if self.fail_start {
            return Err(Error::Encoder("codec unavailable".to_string()));
        }
        self.events.lock().push("encoder.start");
        Ok(())
    }

    fn submit_input(&mut self, _pcm: &[u8], timestamp_us: i64, _wait: Duration) -> Result<bool, Error> {
        if !self.accept.pop_front().unwrap_or(true) {
            return Ok(false);
        }
        for _ in 0..self.outputs_per_input {
            self.pending.push_back(AccessUnit {
                data: vec![self.next_unit; 10],
                presentation_timestamp_us: timestamp_us,
            });
            self.next_unit = self.next_unit.wrapping_add(1);
        }
        Ok(true)
    }

    fn poll_output(&mut self) -> Result<Option<AccessUnit>, Error> {
        Ok(self.pending.pop_front())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.events.lock().push("encoder.stop");
        Ok(())
    }
}

/// Sink keeping every frame. Clones share the frame list.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub frames: Arc<Mutex<Vec<EncodedFrame>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }
}

impl FrameSink for CollectingSink {
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), Error> {
        self.frames.lock().push(frame);
        Ok(())
    }
}

/// Poll `cond` for up to two seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
