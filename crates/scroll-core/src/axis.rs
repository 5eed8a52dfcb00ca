//! Per-axis velocity integration.
//!
//! Each axis carries a signed velocity measured in fine units per tick.
//! Impulses add to it; every emission step removes a fixed fraction
//! (`friction`) and turns the removed amount into whole fine units, carrying
//! the fractional part forward. Fine units are folded into coarse units at
//! [`UNITS_PER_COARSE`] per notch.

use smoothwheel_common::config::ScrollConfig;

use crate::curve::dampening_scale;
use crate::rate::RateTracker;

/// Fine units per coarse notch (kernel hi-res wheel convention).
pub const UNITS_PER_COARSE: i32 = 120;

/// Largest velocity magnitude an axis accepts, in fine units per tick.
///
/// Keeps one step's output well inside `i32` for any friction.
pub const MAX_VELOCITY: f64 = 1_000_000.0;

/// Output of one emission step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisEmission {
    /// Signed fine units to emit.
    pub fine: i32,
    /// Signed coarse units to emit. All units of one step share a sign.
    pub coarse: i32,
    /// The fine units came from the minimum-feedback rule, not from decay.
    pub forced: bool,
}

impl AxisEmission {
    pub fn is_empty(&self) -> bool {
        self.fine == 0 && self.coarse == 0
    }
}

/// Velocity state for one scroll axis.
#[derive(Debug, Clone, Default)]
pub struct AxisState {
    velocity: f64,
    fractional_remainder: f64,
    coarse_carry: i64,
    rate_window: RateTracker,
}

impl AxisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw impulse, scaled by the dampening curve for `rate`.
    ///
    /// Returns the velocity contribution actually applied. Velocity
    /// saturates at [`MAX_VELOCITY`].
    pub fn apply_impulse(&mut self, raw_units: f64, rate: f64, config: &ScrollConfig) -> f64 {
        let scale = dampening_scale(rate, config.low_rate, config.high_rate, config.min_scale);
        let before = self.velocity;
        self.velocity = (before + raw_units * scale * config.multiplier)
            .clamp(-MAX_VELOCITY, MAX_VELOCITY);
        self.velocity - before
    }

    /// One decay step.
    ///
    /// Below `stop_threshold` the axis is reset to rest and nothing is
    /// emitted. Otherwise `friction * velocity` is removed, accumulated into
    /// the fractional remainder, and its whole part becomes fine output.
    pub fn decay_and_emit(&mut self, config: &ScrollConfig) -> AxisEmission {
        if self.velocity.abs() < config.stop_threshold {
            self.stop();
            return AxisEmission::default();
        }

        let removed = self.velocity * config.friction;
        self.velocity -= removed;

        self.fractional_remainder += removed;
        let whole = self.fractional_remainder.trunc();
        self.fractional_remainder -= whole;

        let fine = whole as i32;
        if fine == 0 {
            return AxisEmission::default();
        }

        AxisEmission {
            fine,
            coarse: self.fold_into_coarse(fine),
            forced: false,
        }
    }

    /// Emission step run right after an impulse.
    ///
    /// Same as [`decay_and_emit`](Self::decay_and_emit), except that when
    /// decay alone yields no fine unit while the axis is still moving, one
    /// unit is forced in the direction of travel and taken out of the
    /// velocity. Small, slow inputs therefore always produce feedback.
    ///
    /// "Still moving" is judged on the velocity the impulse left behind,
    /// before this step's decay.
    pub fn prime(&mut self, config: &ScrollConfig) -> AxisEmission {
        let moving = self.velocity.abs() >= config.stop_threshold;
        let emission = self.decay_and_emit(config);
        if emission.fine != 0 || !moving {
            return emission;
        }

        let dir: i32 = if self.velocity > 0.0 { 1 } else { -1 };
        self.velocity -= f64::from(dir);
        self.fractional_remainder = 0.0;

        AxisEmission {
            fine: dir,
            coarse: emission.coarse + self.fold_into_coarse(dir),
            forced: true,
        }
    }

    /// Record an input timestamp and return the current input rate.
    pub fn observe_input(&mut self, now: u64) -> f64 {
        self.rate_window.record(now);
        self.rate_window.rate(now)
    }

    /// Reset motion state. The rate history is kept.
    pub fn stop(&mut self) {
        self.velocity = 0.0;
        self.fractional_remainder = 0.0;
        self.coarse_carry = 0;
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn fractional_remainder(&self) -> f64 {
        self.fractional_remainder
    }

    pub fn coarse_carry(&self) -> i64 {
        self.coarse_carry
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != 0.0
    }

    pub fn rate_window(&self) -> &RateTracker {
        &self.rate_window
    }

    fn fold_into_coarse(&mut self, fine: i32) -> i32 {
        let per_coarse = i64::from(UNITS_PER_COARSE);
        self.coarse_carry += i64::from(fine);
        // Truncating division keeps the carry's sign.
        let coarse = self.coarse_carry / per_coarse;
        self.coarse_carry -= coarse * per_coarse;
        // |coarse| <= |carry| / 120, and the carry is bounded by one step.
        coarse as i32
    }

    #[cfg(test)]
    pub(crate) fn with_state(velocity: f64, fractional_remainder: f64, coarse_carry: i64) -> Self {
        Self {
            velocity,
            fractional_remainder,
            coarse_carry,
            rate_window: RateTracker::new(),
        }
    }
}
