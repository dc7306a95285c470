// ABOUTME: Tunables for the sync core and the live capture pipeline
// ABOUTME: Typed builders with reference defaults plus PEERSYNC_* environment overrides

use crate::audio::capture::PcmFormat;
use crate::audio::encode::EncoderConfig;
use crate::sync::correction::{CorrectionPlanner, RateController};
use crate::sync::drift::DriftCorrector;
use std::time::Duration;
use typed_builder::TypedBuilder;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Clock probing and drift correction settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SyncConfig {
    /// Interval between clock probes
    #[builder(default = Duration::from_secs(2))]
    pub probe_interval: Duration,
    /// Probes unanswered for longer are abandoned
    #[builder(default = Duration::from_secs(1))]
    pub probe_timeout: Duration,
    /// Probe round trips up to this are never rejected as outliers
    #[builder(default = 100_000)]
    pub probe_rtt_floor_micros: i64,
    /// Probes sent right after start, `probe_burst_spacing` apart
    #[builder(default = 5)]
    pub probe_burst: u32,
    /// Spacing of the start-up probe burst
    #[builder(default = Duration::from_millis(200))]
    pub probe_burst_spacing: Duration,
    /// Interval between drift correction ticks
    #[builder(default = Duration::from_millis(100))]
    pub drift_tick: Duration,
    /// Drift above this (ms) is corrected by rate
    #[builder(default = 15)]
    pub soft_threshold_ms: i64,
    /// Drift above this (ms) is corrected by seeking
    #[builder(default = 200)]
    pub hard_threshold_ms: i64,
    /// Proportional gain, rate change per ms of drift
    #[builder(default = 0.001)]
    pub rate_kp: f64,
    /// Integral gain
    #[builder(default = 0.0)]
    pub rate_ki: f64,
    /// Derivative gain
    #[builder(default = 0.0)]
    pub rate_kd: f64,
    /// Lowest rate soft correction may apply
    #[builder(default = 0.8)]
    pub min_rate: f64,
    /// Highest rate soft correction may apply
    #[builder(default = 1.2)]
    pub max_rate: f64,
}

impl SyncConfig {
    /// Defaults, overridden by `PEERSYNC_*` environment variables where set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            probe_interval: Duration::from_millis(env_u64(
                "PEERSYNC_PROBE_INTERVAL_MS",
                defaults.probe_interval.as_millis() as u64,
            )),
            probe_timeout: Duration::from_millis(env_u64(
                "PEERSYNC_PROBE_TIMEOUT_MS",
                defaults.probe_timeout.as_millis() as u64,
            )),
            probe_burst: env_u64("PEERSYNC_PROBE_BURST", defaults.probe_burst as u64) as u32,
            drift_tick: Duration::from_millis(env_u64(
                "PEERSYNC_DRIFT_TICK_MS",
                defaults.drift_tick.as_millis() as u64,
            )),
            soft_threshold_ms: env_u64(
                "PEERSYNC_SOFT_THRESHOLD_MS",
                defaults.soft_threshold_ms as u64,
            ) as i64,
            hard_threshold_ms: env_u64(
                "PEERSYNC_HARD_THRESHOLD_MS",
                defaults.hard_threshold_ms as u64,
            ) as i64,
            rate_kp: env_f64("PEERSYNC_RATE_KP", defaults.rate_kp),
            rate_ki: env_f64("PEERSYNC_RATE_KI", defaults.rate_ki),
            rate_kd: env_f64("PEERSYNC_RATE_KD", defaults.rate_kd),
            ..defaults
        }
    }

    /// Inactive drift corrector using these settings
    pub fn drift_corrector(&self) -> DriftCorrector {
        DriftCorrector::new(
            CorrectionPlanner::with_thresholds(self.soft_threshold_ms, self.hard_threshold_ms),
            RateController::new(
                self.rate_kp,
                self.rate_ki,
                self.rate_kd,
                self.min_rate,
                self.max_rate,
            ),
            self.drift_tick,
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Live capture and encode settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CaptureConfig {
    /// PCM format requested from the capture source
    #[builder(default)]
    pub format: PcmFormat,
    /// Capture source internal buffer size in bytes
    #[builder(default = 8192)]
    pub capture_buffer_bytes: usize,
    /// Bytes read from the source per loop iteration
    #[builder(default = 4096)]
    pub read_chunk_bytes: usize,
    /// How long to wait for an encoder input slot before dropping a chunk
    #[builder(default = Duration::from_millis(5))]
    pub input_wait: Duration,
    /// How long `stop` waits for the capture loop to exit
    #[builder(default = Duration::from_millis(1000))]
    pub stop_timeout: Duration,
    /// Encoder configuration
    #[builder(default)]
    pub encoder: EncoderConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
