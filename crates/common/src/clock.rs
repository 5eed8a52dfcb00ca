//! Clock and timing utilities for the scroll engine.
//!
//! All engine timestamps are monotonic nanoseconds. Ticks are scheduled on
//! absolute deadlines so they never drift under load.

use std::time::Duration;

/// Monotonic timestamp in nanoseconds.
pub type MonotonicNs = u64;

/// Absolute tick schedule.
///
/// Each deadline is the previous deadline plus exactly one period. The
/// schedule never looks at the current time when advancing, so late wakeups
/// do not push later ticks back.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    period_ns: u64,
    next_deadline_ns: MonotonicNs,
    ticks: u64,
}

impl TickSchedule {
    /// First deadline is one period after `start_ns`.
    pub fn new(start_ns: MonotonicNs, period: Duration) -> Self {
        let period_ns = (period.as_nanos() as u64).max(1);
        Self {
            period_ns,
            next_deadline_ns: start_ns + period_ns,
            ticks: 0,
        }
    }

    /// Deadline the clock should currently be armed for.
    pub fn next_deadline(&self) -> MonotonicNs {
        self.next_deadline_ns
    }

    /// Record that the current deadline fired and return the new one.
    pub fn advance(&mut self) -> MonotonicNs {
        self.next_deadline_ns += self.period_ns;
        self.ticks += 1;
        self.next_deadline_ns
    }

    /// How far `now_ns` is past the current deadline (0 if not yet due).
    pub fn lag_ns(&self, now_ns: MonotonicNs) -> u64 {
        now_ns.saturating_sub(self.next_deadline_ns)
    }

    /// Tick period in nanoseconds.
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Number of ticks that have fired.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
