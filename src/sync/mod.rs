// ABOUTME: Clock synchronization and drift correction
// ABOUTME: NTP-style offset estimation, probe bookkeeping, correction bands and rate control

/// Clock offset estimation and reference clock
pub mod clock;
/// Correction bands and rate controller
pub mod correction;
/// Periodic drift corrector
pub mod drift;
/// Clock probe bookkeeping
pub mod probe;

pub use clock::{ClockSync, LocalClock, ManualClock, ReferenceClock, SyncQuality, SystemClock};
pub use correction::{CorrectionBand, CorrectionPlanner, RateController};
pub use drift::{Correction, DriftCorrector, DriftReport};
pub use probe::{ProbeReply, ProbeRequest, ProbeTracker};
