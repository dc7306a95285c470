// ABOUTME: Microphone capture source backed by cpal
// ABOUTME: Owner thread holds the input stream and fills a bounded sample ring

use crate::audio::capture::{CaptureSource, PcmFormat};
use crate::error::Error;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, StreamConfig};
use crossbeam::channel::{self, RecvTimeoutError};
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const OPEN_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_millis(20);
const READ_POLL: Duration = Duration::from_millis(1);

struct OpenStream {
    samples: Arc<ArrayQueue<i16>>,
    channels: usize,
    stop_tx: channel::Sender<()>,
    owner: JoinHandle<()>,
}

/// Default input device as a [`CaptureSource`].
///
/// `cpal::Stream` cannot leave the thread that built it, so a dedicated
/// owner thread builds the stream and keeps it alive until `stop`.
pub struct CpalCapture {
    device_name: Option<String>,
    overruns: Arc<AtomicU64>,
    open: Option<OpenStream>,
}

impl CpalCapture {
    /// Capture from the host's default input device
    pub fn new() -> Self {
        Self {
            device_name: None,
            overruns: Arc::new(AtomicU64::new(0)),
            open: None,
        }
    }

    /// Capture from the input device with this name
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            overruns: Arc::new(AtomicU64::new(0)),
            open: None,
        }
    }

    /// Callback chunks dropped because the ring was full
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CpalCapture {
    fn start(&mut self, format: &PcmFormat, buffer_bytes: usize) -> Result<(), Error> {
        if self.open.is_some() {
            return Ok(());
        }
        if format.bits_per_sample != 16 {
            return Err(Error::Capture(format!(
                "{}-bit capture not supported",
                format.bits_per_sample
            )));
        }

        let samples = Arc::new(ArrayQueue::new((buffer_bytes / 2).max(1)));
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), Error>>(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let ring = Arc::clone(&samples);
        let overruns = Arc::clone(&self.overruns);
        let device_name = self.device_name.clone();
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let owner = std::thread::Builder::new()
            .name("peersync-input".to_string())
            .spawn(move || {
                let stream = match open_input(device_name.as_deref(), &config, ring, overruns) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(Error::Capture(format!(
                        "failed to start input stream: {}",
                        e
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // Blocks until stop sends or the sender is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| Error::Capture(format!("failed to spawn input thread: {}", e)))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = owner.join();
                return Err(e);
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = stop_tx.send(());
                return Err(Error::Capture("input device did not open in time".to_string()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = owner.join();
                return Err(Error::Capture("input thread exited during open".to_string()));
            }
        }

        log::info!(
            "Capturing {} Hz, {} channels from {}",
            format.sample_rate,
            format.channels,
            self.device_name.as_deref().unwrap_or("default input")
        );
        self.open = Some(OpenStream {
            samples,
            channels: format.channels as usize,
            stop_tx,
            owner,
        });
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let open = self
            .open
            .as_ref()
            .ok_or_else(|| Error::Capture("capture not started".to_string()))?;

        // Whole frames only, so channels never rotate
        let frame_samples = open.channels.max(1);
        let max_samples = (buf.len() / 2 / frame_samples) * frame_samples;
        if max_samples == 0 {
            return Ok(0);
        }

        let deadline = Instant::now() + READ_TIMEOUT;
        let available = loop {
            let len = open.samples.len();
            if len >= frame_samples {
                break len;
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            std::thread::sleep(READ_POLL);
        };

        let take = (available.min(max_samples) / frame_samples) * frame_samples;
        let mut written = 0;
        for _ in 0..take {
            let Some(sample) = open.samples.pop() else {
                break;
            };
            buf[written..written + 2].copy_from_slice(&sample.to_le_bytes());
            written += 2;
        }
        Ok(written)
    }

    fn stop(&mut self) -> Result<(), Error> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let _ = open.stop_tx.send(());
        open.owner
            .join()
            .map_err(|_| Error::Capture("input thread panicked".to_string()))?;
        log::info!("Input stream closed, {} overruns", self.overruns());
        Ok(())
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Failed to close input stream: {}", e);
        }
    }
}

fn open_input(
    device_name: Option<&str>,
    config: &StreamConfig,
    ring: Arc<ArrayQueue<i16>>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, Error> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| Error::Capture(format!("failed to list input devices: {}", e)))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::Capture(format!("input device {} not found", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| Error::Capture("No input device available".to_string()))?,
    };

    let sample_format = device
        .default_input_config()
        .map_err(|e| Error::Capture(format!("failed to query input config: {}", e)))?
        .sample_format();

    match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, config, ring, overruns),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, config, ring, overruns),
        cpal::SampleFormat::I32 => build_input::<i32>(&device, config, ring, overruns),
        other => Err(Error::Capture(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    ring: Arc<ArrayQueue<i16>>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, Error>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !push_samples(&ring, data) {
                    overruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| log::error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Capture(format!("failed to build input stream: {}", e)))
}

/// Push `data` as i16 samples. A chunk that does not fit whole is dropped.
fn push_samples<T>(ring: &ArrayQueue<i16>, data: &[T]) -> bool
where
    T: Copy,
    i16: FromSample<T>,
{
    if ring.capacity() - ring.len() < data.len() {
        return false;
    }
    for &sample in data {
        if ring.push(i16::from_sample_(sample)).is_err() {
            return false;
        }
    }
    true
}
