//! Input-rate estimation over a trailing time window.

use smoothwheel_common::clock::MonotonicNs;

/// Ring capacity. Large enough that eviction practically never limits the
/// window query at real wheel rates.
pub const RATE_RING_SIZE: usize = 128;

/// Trailing window used for rate estimation (300 ms).
pub const RATE_WINDOW_NS: u64 = 300_000_000;

/// Elapsed spans shorter than this (1 µs) yield a rate of 0.
const MIN_ELAPSED_NS: u64 = 1_000;

/// Fixed-capacity ring of event timestamps.
///
/// Newest entries overwrite the oldest once full. Timestamps must be
/// recorded in non-decreasing order.
#[derive(Debug, Clone)]
pub struct RateTracker {
    timestamps: [MonotonicNs; RATE_RING_SIZE],
    head: usize,
    count: usize,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            timestamps: [0; RATE_RING_SIZE],
            head: 0,
            count: 0,
        }
    }

    /// Append a timestamp, evicting the oldest entry when full.
    pub fn record(&mut self, timestamp: MonotonicNs) {
        self.timestamps[self.head] = timestamp;
        self.head = (self.head + 1) % RATE_RING_SIZE;
        if self.count < RATE_RING_SIZE {
            self.count += 1;
        }
    }

    /// Events per second within the trailing window ending at `now`.
    ///
    /// The divisor is the span from the oldest in-window entry to `now`,
    /// not the window length, so sparse bursts are estimated accurately.
    /// Returns 0 with fewer than two entries in the window.
    pub fn rate(&self, now: MonotonicNs) -> f64 {
        let cutoff = now.saturating_sub(RATE_WINDOW_NS);
        let mut n = 0usize;
        let mut oldest = now;

        for ts in self.newest_first() {
            if ts < cutoff {
                break;
            }
            n += 1;
            oldest = oldest.min(ts);
        }

        if n < 2 {
            return 0.0;
        }

        let elapsed = now.saturating_sub(oldest);
        if elapsed < MIN_ELAPSED_NS {
            return 0.0;
        }

        n as f64 / (elapsed as f64 / 1e9)
    }

    /// Number of stored timestamps.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn newest_first(&self) -> impl Iterator<Item = MonotonicNs> + '_ {
        (0..self.count).map(move |i| {
            let idx = (self.head + RATE_RING_SIZE - 1 - i) % RATE_RING_SIZE;
            self.timestamps[idx]
        })
    }
}
