// ABOUTME: Clock probe bookkeeping
// ABOUTME: Tags outgoing time requests and correlates replies into offset measurements

use crate::sync::clock::{ClockOffset, ClockSync};
use std::collections::VecDeque;

/// Probes kept waiting for a reply; older ones are dropped first.
const MAX_PENDING: usize = 16;

/// Outgoing clock probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Correlation tag echoed by the reference
    pub seq: u32,
    /// Local send time (t0) in microseconds
    pub client_transmitted: i64,
}

/// Reply from the reference clock.
///
/// A reference that stamps a single instant sets both fields to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReply {
    /// Tag of the probe being answered
    pub seq: u32,
    /// Reference receive time (t1)
    pub reference_received: i64,
    /// Reference transmit time (t2)
    pub reference_transmitted: i64,
}

#[derive(Debug, Clone, Copy)]
struct PendingProbe {
    seq: u32,
    sent_at: i64,
}

/// Tracks in-flight probes.
#[derive(Debug, Default)]
pub struct ProbeTracker {
    next_seq: u32,
    pending: VecDeque<PendingProbe>,
}

impl ProbeTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new probe sent at `local_now` and return the request to transmit.
    pub fn begin(&mut self, local_now: i64) -> ProbeRequest {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        if self.pending.len() == MAX_PENDING {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingProbe {
            seq,
            sent_at: local_now,
        });

        ProbeRequest {
            seq,
            client_transmitted: local_now,
        }
    }

    /// Feed a reply received at `local_now` into `sync`.
    ///
    /// Replies for unknown or expired probes are ignored. Returns the
    /// measurement when `sync` accepted it.
    pub fn complete(
        &mut self,
        reply: ProbeReply,
        local_now: i64,
        sync: &mut ClockSync,
    ) -> Option<ClockOffset> {
        let index = self.pending.iter().position(|p| p.seq == reply.seq)?;
        let probe = self.pending.remove(index)?;
        sync.update(
            probe.sent_at,
            reply.reference_received,
            reply.reference_transmitted,
            local_now,
        )
    }

    /// Drop probes unanswered for longer than `timeout_micros`.
    ///
    /// The offset estimate is untouched. Returns how many were dropped.
    pub fn expire(&mut self, local_now: i64, timeout_micros: i64) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|p| local_now - p.sent_at <= timeout_micros);
        let expired = before - self.pending.len();
        if expired > 0 {
            log::warn!("{} clock probe(s) timed out, keeping last offset", expired);
        }
        expired
    }

    /// Number of probes still waiting for a reply
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
