// ABOUTME: Live capture/encode pipeline
// ABOUTME: Dedicated thread reading PCM, feeding the encoder and emitting ADTS frames

use crate::audio::adts::AdtsHeader;
use crate::audio::capture::CaptureSource;
use crate::audio::encode::{FrameEncoder, FrameSink};
use crate::config::CaptureConfig;
use crate::error::Error;
use crate::status::{StatusEvent, StatusReporter};
use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Result of [`CapturePipeline::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new capture loop is running
    Started,
    /// A loop was already running; nothing changed
    AlreadyCapturing,
    /// A stopped loop has not released its resources yet; nothing started
    StillStopping,
}

/// Counters shared with the capture loop.
#[derive(Debug, Default)]
struct Counters {
    chunks_read: AtomicU64,
    chunks_dropped: AtomicU64,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// PCM chunks read from the capture source
    pub chunks_read: u64,
    /// Chunks dropped because no encoder input slot was free
    pub chunks_dropped: u64,
    /// Frames handed to the sink
    pub frames_sent: u64,
    /// Frames the sink refused
    pub frames_dropped: u64,
}

struct ActiveCapture {
    running: Arc<AtomicBool>,
    done: channel::Receiver<()>,
    handle: JoinHandle<()>,
}

enum PipelineState {
    Idle,
    Capturing(ActiveCapture),
    /// Told to stop but not finished within the stop timeout
    Stopping(ActiveCapture),
}

/// Capture → encode → frame pipeline with a single active session.
pub struct CapturePipeline {
    config: CaptureConfig,
    state: Mutex<PipelineState>,
    counters: Arc<Counters>,
    status: StatusReporter,
}

impl CapturePipeline {
    /// Create an idle pipeline
    pub fn new(config: CaptureConfig, status: StatusReporter) -> Self {
        Self {
            config,
            state: Mutex::new(PipelineState::Idle),
            counters: Arc::new(Counters::default()),
            status,
        }
    }

    /// Open `capture` and `encoder` and start the capture loop.
    ///
    /// Capability failures leave the pipeline idle and are returned once.
    /// Starting while a loop is running changes nothing. A loop that missed
    /// the stop timeout is waited on once more; if it still holds its
    /// resources nothing is started.
    pub fn start<C, E, S>(&self, mut capture: C, mut encoder: E, sink: S) -> Result<StartOutcome, Error>
    where
        C: CaptureSource + 'static,
        E: FrameEncoder + 'static,
        S: FrameSink + 'static,
    {
        let mut state = self.state.lock();
        if let PipelineState::Capturing(active) = &*state {
            if active.running.load(Ordering::Acquire) {
                log::debug!("Capture already running, ignoring start");
                return Ok(StartOutcome::AlreadyCapturing);
            }
        }
        // A loop that ended on its own or was stopped late is reaped first
        match std::mem::replace(&mut *state, PipelineState::Idle) {
            PipelineState::Idle => {}
            PipelineState::Capturing(previous) | PipelineState::Stopping(previous) => {
                if let Some(unfinished) = self.join(previous) {
                    *state = PipelineState::Stopping(unfinished);
                    log::warn!("Previous capture loop still running, not starting");
                    return Ok(StartOutcome::StillStopping);
                }
            }
        }

        let header = AdtsHeader::for_config(&self.config.encoder)?;

        if let Err(e) = capture.start(&self.config.format, self.config.capture_buffer_bytes) {
            log::error!("Capture source unavailable: {}", e);
            self.status.emit(StatusEvent::CaptureFailed(e.to_string()));
            return Err(e);
        }
        if let Err(e) = encoder.start(&self.config.encoder) {
            log::error!("Encoder unavailable: {}", e);
            if let Err(stop_err) = capture.stop() {
                log::warn!("Failed to stop capture source: {}", stop_err);
            }
            self.status.emit(StatusEvent::CaptureFailed(e.to_string()));
            return Err(e);
        }

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = channel::bounded(1);
        let loop_running = Arc::clone(&running);
        let counters = Arc::clone(&self.counters);
        let config = self.config.clone();

        // Encoder and capture move into the thread and are released there,
        // after the loop has exited.
        let spawned = std::thread::Builder::new()
            .name("peersync-capture".to_string())
            .spawn(move || {
                let mut capture = capture;
                let mut encoder = encoder;
                let mut sink = sink;
                capture_loop(
                    &mut capture,
                    &mut encoder,
                    &mut sink,
                    header,
                    &config,
                    &loop_running,
                    &counters,
                );
                loop_running.store(false, Ordering::Release);
                drop(sink);
                release(&mut encoder, &mut capture);
                let _ = done_tx.send(());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err = Error::Capture(format!("failed to spawn capture thread: {}", e));
                self.status.emit(StatusEvent::CaptureFailed(err.to_string()));
                return Err(err);
            }
        };

        *state = PipelineState::Capturing(ActiveCapture {
            running,
            done: done_rx,
            handle,
        });
        log::info!("Live capture started");
        self.status.emit(StatusEvent::CaptureStarted);
        Ok(StartOutcome::Started)
    }

    /// Stop the capture loop and release its resources.
    ///
    /// Waits at most the configured stop timeout. A loop still running after
    /// that is kept as stopping and no longer delivers frames. Returns false
    /// if nothing was capturing.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let active = match std::mem::replace(&mut *state, PipelineState::Idle) {
            PipelineState::Idle => return false,
            PipelineState::Stopping(active) => {
                if let Some(unfinished) = self.join(active) {
                    *state = PipelineState::Stopping(unfinished);
                }
                return false;
            }
            PipelineState::Capturing(active) => active,
        };

        active.running.store(false, Ordering::Release);
        if let Some(unfinished) = self.join(active) {
            *state = PipelineState::Stopping(unfinished);
        }
        log::info!("Live capture stopped");
        self.status.emit(StatusEvent::CaptureStopped);
        true
    }

    /// Whether a capture loop is running
    pub fn is_capturing(&self) -> bool {
        match &*self.state.lock() {
            PipelineState::Capturing(active) => active.running.load(Ordering::Acquire),
            PipelineState::Idle | PipelineState::Stopping(_) => false,
        }
    }

    /// Counters accumulated over the pipeline's lifetime
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            chunks_read: self.counters.chunks_read.load(Ordering::Relaxed),
            chunks_dropped: self.counters.chunks_dropped.load(Ordering::Relaxed),
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Wait up to the stop timeout for the loop to release its resources.
    /// Hands the loop back if it is still running.
    fn join(&self, active: ActiveCapture) -> Option<ActiveCapture> {
        match active.done.recv_timeout(self.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if active.handle.join().is_err() {
                    log::error!("Capture thread panicked");
                }
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture loop did not exit within {:?}",
                    self.config.stop_timeout
                );
                Some(active)
            }
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<C, E, S>(
    capture: &mut C,
    encoder: &mut E,
    sink: &mut S,
    header: AdtsHeader,
    config: &CaptureConfig,
    running: &AtomicBool,
    counters: &Counters,
) where
    C: CaptureSource,
    E: FrameEncoder,
    S: FrameSink,
{
    let mut buf = vec![0u8; config.read_chunk_bytes];
    let started = Instant::now();

    while running.load(Ordering::Acquire) {
        let read = match capture.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                log::debug!("Capture read failed: {}", e);
                std::thread::sleep(READ_ERROR_BACKOFF);
                continue;
            }
        };
        // A read may outlast stop; nothing read after it is delivered
        if !running.load(Ordering::Acquire) {
            return;
        }
        if read == 0 {
            continue;
        }
        counters.chunks_read.fetch_add(1, Ordering::Relaxed);

        let timestamp_us = started.elapsed().as_micros() as i64;
        match encoder.submit_input(&buf[..read], timestamp_us, config.input_wait) {
            Ok(true) => {}
            Ok(false) => {
                counters.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("No encoder input slot, dropped {} bytes", read);
            }
            Err(e) => {
                counters.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Encoder rejected input: {}", e);
            }
        }

        loop {
            let unit = match encoder.poll_output() {
                Ok(Some(unit)) => unit,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Encoder output failed: {}", e);
                    break;
                }
            };
            if unit.data.is_empty() {
                continue;
            }
            let frame = match header.frame(unit) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Dropping access unit: {}", e);
                    continue;
                }
            };
            if !running.load(Ordering::Acquire) {
                return;
            }
            match sink.send_frame(frame) {
                Ok(()) => {
                    counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(Error::ChannelClosed) => {
                    log::info!("Frame sink closed, ending capture");
                    return;
                }
                Err(Error::SinkFull) => {
                    counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Frame sink full, dropped frame");
                }
                Err(e) => {
                    counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Failed to send frame: {}", e);
                }
            }
        }
    }
}

fn release<C: CaptureSource, E: FrameEncoder>(encoder: &mut E, capture: &mut C) {
    if let Err(e) = encoder.stop() {
        log::warn!("Failed to stop encoder: {}", e);
    }
    if let Err(e) = capture.stop() {
        log::warn!("Failed to stop capture source: {}", e);
    }
}
