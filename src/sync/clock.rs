// ABOUTME: Clock offset estimation between a peer and the shared reference clock
// ABOUTME: NTP-style round-trip math, last-known offset, and local/reference time conversion

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Accepted samples older than this mark the estimate as stale.
const STALE_AFTER_MICROS: i64 = 5_000_000;

/// Round trips up to this are accepted without comparison to recent ones.
pub const DEFAULT_RTT_FLOOR_MICROS: i64 = 100_000;

/// Recent round trips kept for outlier rejection, accepted or not.
const RTT_WINDOW: usize = 8;

/// A round trip more than this many times the best recent one is an outlier.
const OUTLIER_FACTOR: i64 = 2;

/// One offset measurement computed from a probe round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset {
    /// `reference = local + offset`, in microseconds
    pub offset: i64,
    /// Round-trip time excluding reference processing, in microseconds
    pub rtt: i64,
}

impl ClockOffset {
    /// Compute offset and RTT from the four probe timestamps.
    ///
    /// t0 = local send, t1 = reference receive, t2 = reference transmit,
    /// t3 = local receive. Assumes symmetric network latency.
    pub fn calculate(t0: i64, t1: i64, t2: i64, t3: i64) -> Self {
        let rtt = (t3 - t0) - (t2 - t1);
        let offset = ((t1 - t0) + (t2 - t3)) / 2;
        Self { offset, rtt }
    }
}

/// Clock synchronization quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncQuality {
    /// Good synchronization (RTT < 50ms)
    Good,
    /// Degraded synchronization (RTT 50-100ms)
    Degraded,
    /// Lost synchronization (RTT > 100ms or no sync)
    Lost,
}

/// Last-known clock offset between this peer and the reference clock.
///
/// The offset starts at 0 and is replaced by every accepted measurement.
/// The first sample is always accepted. Later samples are rejected only
/// when their round trip is above the floor and more than twice the best
/// of the recent ones, so a uniformly slow link still converges.
/// A probe that never gets an answer leaves the previous value in place.
#[derive(Debug)]
pub struct ClockSync {
    offset_micros: i64,
    /// Last measured RTT in microseconds, accepted or not
    rtt_micros: Option<i64>,
    /// Local time of the last accepted sample
    last_update: Option<i64>,
    samples: u64,
    recent_rtts: VecDeque<i64>,
    rtt_floor_micros: i64,
}

impl ClockSync {
    /// Create a new clock synchronization instance
    pub fn new() -> Self {
        Self::with_rtt_floor(DEFAULT_RTT_FLOOR_MICROS)
    }

    /// Create an instance that never treats round trips up to
    /// `rtt_floor_micros` as outliers.
    pub fn with_rtt_floor(rtt_floor_micros: i64) -> Self {
        Self {
            offset_micros: 0,
            rtt_micros: None,
            last_update: None,
            samples: 0,
            recent_rtts: VecDeque::with_capacity(RTT_WINDOW),
            rtt_floor_micros,
        }
    }

    /// Update clock sync with new measurement.
    ///
    /// Returns the measurement when it was accepted, `None` when it was
    /// discarded as a congestion outlier.
    pub fn update(&mut self, t0: i64, t1: i64, t2: i64, t3: i64) -> Option<ClockOffset> {
        let measured = ClockOffset::calculate(t0, t1, t2, t3);
        self.rtt_micros = Some(measured.rtt);

        if measured.rtt < 0 {
            log::warn!("Discarding sync sample: negative RTT {}µs", measured.rtt);
            return None;
        }

        let outlier = self.is_outlier(measured.rtt);
        if self.recent_rtts.len() == RTT_WINDOW {
            self.recent_rtts.pop_front();
        }
        self.recent_rtts.push_back(measured.rtt);

        if outlier {
            log::warn!("Discarding sync sample: RTT {}µs", measured.rtt);
            return None;
        }

        self.offset_micros = measured.offset;
        self.last_update = Some(t3);
        self.samples += 1;
        log::debug!(
            "Clock offset updated: offset={}µs rtt={}µs",
            measured.offset,
            measured.rtt
        );
        Some(measured)
    }

    fn is_outlier(&self, rtt: i64) -> bool {
        if self.samples == 0 || rtt <= self.rtt_floor_micros {
            return false;
        }
        match self.recent_rtts.iter().min() {
            Some(&best) => rtt > best.saturating_mul(OUTLIER_FACTOR),
            None => false,
        }
    }

    /// Current offset in microseconds (`reference = local + offset`).
    pub fn offset_micros(&self) -> i64 {
        self.offset_micros
    }

    /// Get current RTT in microseconds
    pub fn rtt_micros(&self) -> Option<i64> {
        self.rtt_micros
    }

    /// Number of accepted samples since creation.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Convert local microseconds to reference microseconds
    pub fn local_to_reference(&self, local_micros: i64) -> i64 {
        local_micros + self.offset_micros
    }

    /// Convert reference microseconds to local microseconds
    pub fn reference_to_local(&self, reference_micros: i64) -> i64 {
        reference_micros - self.offset_micros
    }

    /// Get sync quality based on RTT
    pub fn quality(&self) -> SyncQuality {
        if self.samples == 0 {
            return SyncQuality::Lost;
        }
        match self.rtt_micros {
            Some(rtt) if rtt < 50_000 => SyncQuality::Good,
            Some(rtt) if rtt < 100_000 => SyncQuality::Degraded,
            _ => SyncQuality::Lost,
        }
    }

    /// Check if the last accepted sample is more than 5 seconds old
    pub fn is_stale(&self, local_now: i64) -> bool {
        match self.last_update {
            Some(last) => local_now - last > STALE_AFTER_MICROS,
            None => true,
        }
    }

    /// Check if at least one sample has been accepted
    pub fn is_synchronized(&self) -> bool {
        self.samples > 0
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of local time in microseconds.
pub trait LocalClock: Send + Sync {
    /// Current local time in microseconds
    fn now_micros(&self) -> i64;
}

/// Wall clock in Unix microseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn now_micros(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to. Used to drive deterministic runs.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start_micros`
    pub fn new(start_micros: i64) -> Self {
        Self {
            now: AtomicI64::new(start_micros),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, micros: i64) {
        self.now.store(micros, Ordering::SeqCst);
    }

    /// Move forward by `micros`
    pub fn advance(&self, micros: i64) {
        self.now.fetch_add(micros, Ordering::SeqCst);
    }
}

impl LocalClock for ManualClock {
    fn now_micros(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// One consistent reading of local time and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Local time in microseconds
    pub local_micros: i64,
    /// Offset in effect at `local_micros`
    pub offset_micros: i64,
}

impl ClockReading {
    /// Reference time of this reading
    pub fn reference_micros(&self) -> i64 {
        self.local_micros + self.offset_micros
    }
}

/// Local clock paired with the shared offset estimate.
#[derive(Clone)]
pub struct ReferenceClock {
    local: Arc<dyn LocalClock>,
    sync: Arc<Mutex<ClockSync>>,
}

impl ReferenceClock {
    /// Combine a local clock with a shared offset estimate
    pub fn new(local: Arc<dyn LocalClock>, sync: Arc<Mutex<ClockSync>>) -> Self {
        Self { local, sync }
    }

    /// Reference clock over the system wall clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(Mutex::new(ClockSync::new())))
    }

    /// Shared offset estimate
    pub fn clock_sync(&self) -> &Arc<Mutex<ClockSync>> {
        &self.sync
    }

    /// Current local time in microseconds
    pub fn local_now(&self) -> i64 {
        self.local.now_micros()
    }

    /// Last known offset. Never blocks on a probe.
    pub fn current_offset(&self) -> i64 {
        self.sync.lock().offset_micros()
    }

    /// `local_now() + current_offset()`
    pub fn reference_now(&self) -> i64 {
        self.sample().reference_micros()
    }

    /// Read local time and offset together.
    pub fn sample(&self) -> ClockReading {
        let sync = self.sync.lock();
        ClockReading {
            local_micros: self.local.now_micros(),
            offset_micros: sync.offset_micros(),
        }
    }
}
