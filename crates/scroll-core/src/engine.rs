//! Scroll engine: event routing and frame batching.
//!
//! The engine owns both axes and decides what reaches the sink:
//! - wheel records become impulses and are never forwarded as-is
//! - other records are forwarded unchanged
//! - source frame terminators are forwarded only when forwarded records
//!   are still waiting for one, so scroll-only frames never produce bare
//!   terminators
//! - every emission (primed on input or driven by a tick) is closed by its
//!   own terminator
//!
//! Sink failures are logged and counted, never propagated. The next tick
//! picks up from the accumulated state.

use serde::Serialize;
use smoothwheel_common::clock::MonotonicNs;
use smoothwheel_common::config::ScrollConfig;
use smoothwheel_common::error::SmoothResult;

use crate::axis::{AxisEmission, AxisState, UNITS_PER_COARSE};
use crate::event::{Axis, EventClass, RawEvent};
use crate::sink::{write_emission, EventSink};

/// Running counters for one engine lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Wheel records turned into impulses.
    pub impulses: u64,
    /// Coarse records ignored because the axis reports hi-res input.
    pub deduped_coarse: u64,
    /// Clock ticks processed.
    pub ticks: u64,
    /// Absolute fine units emitted.
    pub fine_units: u64,
    /// Absolute coarse units emitted.
    pub coarse_units: u64,
    /// Fine units produced by the minimum-feedback rule.
    pub forced_units: u64,
    /// Records forwarded unchanged.
    pub forwarded: u64,
    /// Terminators written.
    pub frames: u64,
    /// Sink writes that failed.
    pub write_errors: u64,
}

/// Inertial scroll engine for two axes.
#[derive(Debug, Clone)]
pub struct ScrollEngine {
    config: ScrollConfig,
    vertical: AxisState,
    horizontal: AxisState,
    /// Per axis: a hi-res record has been seen.
    fine_seen: [bool; 2],
    /// Forwarded records are waiting for a terminator.
    pass_through_pending: bool,
    stats: EngineStats,
}

impl ScrollEngine {
    /// Create an engine. `config` is used as given.
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            vertical: AxisState::new(),
            horizontal: AxisState::new(),
            fine_seen: [false; 2],
            pass_through_pending: false,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    pub fn axis(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::Vertical => &self.vertical,
            Axis::Horizontal => &self.horizontal,
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Both axes are at rest.
    pub fn is_idle(&self) -> bool {
        !self.vertical.is_moving() && !self.horizontal.is_moving()
    }

    /// Process one input record received at `now`.
    pub fn handle_input<S: EventSink + ?Sized>(
        &mut self,
        event: RawEvent,
        now: MonotonicNs,
        sink: &mut S,
    ) {
        let class = event.classify();
        match class {
            EventClass::FrameTerminator => {
                if self.pass_through_pending {
                    self.close_frame(sink);
                }
                self.pass_through_pending = false;
            }
            EventClass::PassThrough => {
                let result = sink.write_event(event);
                self.deliver(result);
                self.stats.forwarded += 1;
                self.pass_through_pending = true;
            }
            EventClass::VerticalCoarse
            | EventClass::VerticalFine
            | EventClass::HorizontalCoarse
            | EventClass::HorizontalFine => {
                if let Some((axis, fine)) = class.scroll_axis() {
                    self.impulse(axis, fine, event.value, now, sink);
                }
            }
        }
    }

    /// One clock tick: decay both axes and emit one frame if anything moved.
    ///
    /// Returns whether a frame was written.
    pub fn tick<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        self.stats.ticks += 1;

        let mut emitted = false;
        for axis in Axis::ALL {
            let (state, config) = self.axis_with_config(axis);
            let emission = state.decay_and_emit(config);
            if emission.is_empty() {
                continue;
            }
            self.emit(axis, emission, sink);
            emitted = true;
        }

        if emitted {
            self.close_frame(sink);
        }
        emitted
    }

    fn impulse<S: EventSink + ?Sized>(
        &mut self,
        axis: Axis,
        fine: bool,
        value: i32,
        now: MonotonicNs,
        sink: &mut S,
    ) {
        let slot = axis as usize;
        if fine {
            self.fine_seen[slot] = true;
        } else if self.config.dedupe_coarse_when_fine && self.fine_seen[slot] {
            self.stats.deduped_coarse += 1;
            return;
        }

        let raw = if fine {
            f64::from(value)
        } else {
            f64::from(value) * f64::from(UNITS_PER_COARSE)
        };

        let (state, config) = self.axis_with_config(axis);
        let rate = state.observe_input(now);
        let contribution = state.apply_impulse(raw, rate, config);
        let emission = state.prime(config);
        let velocity = state.velocity();
        self.stats.impulses += 1;

        tracing::debug!(
            axis = axis.label(),
            value,
            raw,
            rate,
            contribution,
            velocity,
            "impulse"
        );

        if !emission.is_empty() {
            self.emit(axis, emission, sink);
            self.close_frame(sink);
        }
    }

    fn emit<S: EventSink + ?Sized>(&mut self, axis: Axis, emission: AxisEmission, sink: &mut S) {
        let result = write_emission(sink, axis, emission);
        self.deliver(result);

        self.stats.fine_units += u64::from(emission.fine.unsigned_abs());
        self.stats.coarse_units += u64::from(emission.coarse.unsigned_abs());
        if emission.forced {
            self.stats.forced_units += 1;
        }

        let state = self.axis(axis);
        tracing::trace!(
            axis = axis.label(),
            fine = emission.fine,
            coarse = emission.coarse,
            forced = emission.forced,
            velocity = state.velocity(),
            remainder = state.fractional_remainder(),
            carry = state.coarse_carry(),
            "emit"
        );
    }

    fn close_frame<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        let result = sink.end_frame();
        self.deliver(result);
        self.stats.frames += 1;
        self.pass_through_pending = false;
    }

    fn deliver(&mut self, result: SmoothResult<()>) {
        if let Err(e) = result {
            self.stats.write_errors += 1;
            tracing::warn!(error = %e, "Failed to write output event");
        }
    }

    fn axis_with_config(&mut self, axis: Axis) -> (&mut AxisState, &ScrollConfig) {
        let state = match axis {
            Axis::Vertical => &mut self.vertical,
            Axis::Horizontal => &mut self.horizontal,
        };
        (state, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::MAX_VELOCITY;
    use crate::event::{EV_KEY, REL_HWHEEL_HI_RES, REL_WHEEL, REL_WHEEL_HI_RES, REL_X};
    use crate::sink::RecordingSink;
    use smoothwheel_common::error::SmoothError;

    const BTN_LEFT: u16 = 0x110;

    fn engine() -> ScrollEngine {
        ScrollEngine::new(ScrollConfig::default())
    }

    #[test]
    fn test_scroll_only_frame_has_no_bare_terminator() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();

        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 0, &mut sink);
        engine.handle_input(RawEvent::syn_report(), 0, &mut sink);

        // One frame from the primed emission, none from the source SYN.
        assert_eq!(sink.frames().len(), 1);
        assert!(sink.frames().iter().all(|f| !f.is_empty()));
        assert_eq!(sink.frames()[0][0], RawEvent::rel(REL_WHEEL_HI_RES, 4));
    }

    #[test]
    fn test_pass_through_frame_is_forwarded() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();

        engine.handle_input(RawEvent::new(EV_KEY, BTN_LEFT, 1), 0, &mut sink);
        engine.handle_input(RawEvent::rel(REL_X, 5), 0, &mut sink);
        assert_eq!(sink.frames().len(), 0);
        engine.handle_input(RawEvent::syn_report(), 0, &mut sink);

        assert_eq!(
            sink.frames(),
            &[vec![
                RawEvent::new(EV_KEY, BTN_LEFT, 1),
                RawEvent::rel(REL_X, 5)
            ]]
        );
        // A second SYN with nothing forwarded is suppressed.
        engine.handle_input(RawEvent::syn_report(), 0, &mut sink);
        assert_eq!(sink.frames().len(), 1);
        assert_eq!(engine.stats().forwarded, 2);
    }

    #[test]
    fn test_mixed_frame_shares_terminator_with_scroll() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();

        engine.handle_input(RawEvent::rel(REL_X, 2), 0, &mut sink);
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 0, &mut sink);
        engine.handle_input(RawEvent::syn_report(), 0, &mut sink);

        assert_eq!(sink.frames().len(), 1);
        assert_eq!(sink.frames()[0][0], RawEvent::rel(REL_X, 2));
        assert_eq!(sink.frames()[0][1].code, REL_WHEEL_HI_RES);
    }

    #[test]
    fn test_tick_emits_one_frame_for_both_axes() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 0, &mut sink);
        engine.handle_input(RawEvent::rel(REL_HWHEEL_HI_RES, 120), 0, &mut sink);
        sink.clear();

        assert!(engine.tick(&mut sink));
        assert_eq!(sink.frames().len(), 1);
        let codes: Vec<u16> = sink.frames()[0].iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![REL_WHEEL_HI_RES, REL_HWHEEL_HI_RES]);
    }

    #[test]
    fn test_idle_tick_writes_nothing() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();
        assert!(!engine.tick(&mut sink));
        assert!(sink.frames().is_empty());
        assert_eq!(engine.stats().ticks, 1);
    }

    #[test]
    fn test_glide_runs_to_rest() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_WHEEL, 3), 0, &mut sink);

        let mut ticks = 0;
        while !engine.is_idle() {
            engine.tick(&mut sink);
            ticks += 1;
            assert!(ticks < 1_000);
        }
        let total = sink.total_for_code(REL_WHEEL_HI_RES);
        // 3 notches * 120 * multiplier 0.5 = 180, minus what stopped below threshold.
        assert!(total > 170 && total <= 180, "total={total}");
        assert_eq!(sink.total_for_code(REL_WHEEL), 1);
    }

    fn deduping_engine() -> ScrollEngine {
        ScrollEngine::new(ScrollConfig {
            dedupe_coarse_when_fine: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_coarse_after_hi_res_is_impulsed_by_default() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_WHEEL_HI_RES, 120), 0, &mut sink);
        let after_fine = engine.axis(Axis::Vertical).velocity();
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 1_000_000, &mut sink);

        assert_eq!(engine.stats().impulses, 2);
        assert_eq!(engine.stats().deduped_coarse, 0);
        assert_eq!(engine.axis(Axis::Vertical).rate_window().len(), 2);
        assert!(engine.axis(Axis::Vertical).velocity() > after_fine);
    }

    #[test]
    fn test_coarse_deduped_after_hi_res() {
        let mut engine = deduping_engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_WHEEL_HI_RES, 120), 0, &mut sink);
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 0, &mut sink);
        assert_eq!(engine.stats().impulses, 1);
        assert_eq!(engine.stats().deduped_coarse, 1);
        assert!((engine.axis(Axis::Vertical).velocity() - (60.0 - 4.68)).abs() < 1e-9);
    }

    #[test]
    fn test_dedupe_is_per_axis() {
        let mut engine = deduping_engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_HWHEEL_HI_RES, 60), 0, &mut sink);
        engine.handle_input(RawEvent::rel(REL_WHEEL, -1), 0, &mut sink);
        assert_eq!(engine.stats().impulses, 2);
        assert_eq!(engine.stats().deduped_coarse, 0);
        assert!(engine.axis(Axis::Vertical).velocity() < 0.0);
    }

    #[test]
    fn test_huge_wheel_value_is_bounded() {
        let mut engine = engine();
        let mut sink = RecordingSink::new();
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1_000_000_000), 0, &mut sink);
        assert!(engine.axis(Axis::Vertical).velocity() <= MAX_VELOCITY);

        for _ in 0..50 {
            assert!(engine.tick(&mut sink));
        }
        let axis = engine.axis(Axis::Vertical);
        assert!(axis.velocity() > 0.0);
        assert!(axis.coarse_carry().abs() < i64::from(UNITS_PER_COARSE));

        // Every emitted fine unit is accounted for in the coarse output.
        let fine = sink.total_for_code(REL_WHEEL_HI_RES);
        let coarse = sink.total_for_code(REL_WHEEL);
        assert_eq!(coarse * i64::from(UNITS_PER_COARSE) + axis.coarse_carry(), fine);
        assert_eq!(engine.stats().fine_units, fine as u64);

        let longest = sink.frames().iter().map(Vec::len).max().unwrap_or(0);
        assert!(longest <= 1 + (MAX_VELOCITY as usize) / 120 / 4);
    }

    struct FailingSink {
        attempts: u32,
    }

    impl EventSink for FailingSink {
        fn write_event(&mut self, _event: RawEvent) -> SmoothResult<()> {
            self.attempts += 1;
            Err(SmoothError::uinput("device gone"))
        }

        fn end_frame(&mut self) -> SmoothResult<()> {
            self.attempts += 1;
            Err(SmoothError::uinput("device gone"))
        }
    }

    #[test]
    fn test_sink_failures_do_not_stop_the_engine() {
        let mut engine = engine();
        let mut sink = FailingSink { attempts: 0 };
        engine.handle_input(RawEvent::rel(REL_WHEEL, 1), 0, &mut sink);
        assert!(engine.tick(&mut sink));
        assert!(engine.stats().write_errors >= 3);
        assert_eq!(engine.stats().write_errors, u64::from(sink.attempts));
        assert!(engine.axis(Axis::Vertical).is_moving());
    }
}
