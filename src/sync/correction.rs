// ABOUTME: Drift correction policy
// ABOUTME: Maps playback drift to a nominal, soft (rate) or hard (seek) correction

/// Correction band selected for one drift measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionBand {
    /// Within tolerance; playback rate should be 1.0.
    Nominal,
    /// Correct gradually by adjusting playback rate.
    Soft,
    /// Too far off; seek to the expected position.
    Hard,
}

/// Planner that converts drift into a correction band.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionPlanner {
    soft_threshold_ms: i64,
    hard_threshold_ms: i64,
}

impl CorrectionPlanner {
    /// Create a planner with default thresholds (15ms soft, 200ms hard).
    pub fn new() -> Self {
        Self::with_thresholds(15, 200)
    }

    /// Create a planner with explicit thresholds in milliseconds.
    pub fn with_thresholds(soft_threshold_ms: i64, hard_threshold_ms: i64) -> Self {
        Self {
            soft_threshold_ms,
            hard_threshold_ms,
        }
    }

    /// Pick a band for `drift_ms` (actual minus expected position).
    pub fn plan(&self, drift_ms: i64) -> CorrectionBand {
        let magnitude = drift_ms.saturating_abs();
        if magnitude > self.hard_threshold_ms {
            CorrectionBand::Hard
        } else if magnitude > self.soft_threshold_ms {
            CorrectionBand::Soft
        } else {
            CorrectionBand::Nominal
        }
    }
}

impl Default for CorrectionPlanner {
    fn default() -> Self {
        Self::new()
    }
}

/// PID mapping from drift to a clamped playback rate.
///
/// Drift is in milliseconds and the output is `1.0 + correction`, so
/// being behind (negative drift) speeds playback up and being ahead
/// slows it down.
#[derive(Debug, Clone)]
pub struct RateController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    last_error: Option<f64>,
    max_integral: f64,
    min_rate: f64,
    max_rate: f64,
}

impl RateController {
    /// Create a controller with the given gains and rate bounds.
    pub fn new(kp: f64, ki: f64, kd: f64, min_rate: f64, max_rate: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            last_error: None,
            max_integral: 100.0,
            min_rate,
            max_rate,
        }
    }

    /// Forget accumulated integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }

    /// Playback rate for `drift_ms` measured `dt_seconds` after the previous call.
    pub fn next_rate(&mut self, drift_ms: f64, dt_seconds: f64) -> f64 {
        let error = -drift_ms;

        self.integral += error * dt_seconds;
        self.integral = self.integral.clamp(-self.max_integral, self.max_integral);

        let derivative = match self.last_error {
            Some(last) if dt_seconds > 0.0 => (error - last) / dt_seconds,
            _ => 0.0,
        };
        self.last_error = Some(error);

        let correction = self.kp * error + self.ki * self.integral + self.kd * derivative;
        (1.0 + correction).clamp(self.min_rate, self.max_rate)
    }
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(0.001, 0.0, 0.0, 0.8, 1.2)
    }
}
