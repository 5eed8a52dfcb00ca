use std::sync::Arc;

use proptest::prelude::*;
use smoothwheel_common::config::ScrollConfig;
use smoothwheel_event_loop::sim::{simulate, ScriptedEvent, Simulation};
use smoothwheel_event_loop::{LoopState, ScrollReactor, StopReason};
use smoothwheel_scroll_core::event::{REL_HWHEEL, REL_WHEEL, REL_WHEEL_HI_RES, REL_X};
use smoothwheel_scroll_core::{RawEvent, RecordingSink};

const MS: u64 = 1_000_000;

type SimReactor = ScrollReactor<
    smoothwheel_event_loop::sim::SimSource,
    smoothwheel_event_loop::sim::SimClock,
    smoothwheel_event_loop::sim::SimMultiplexer,
    RecordingSink,
>;

fn reactor(sim: &Simulation) -> SimReactor {
    ScrollReactor::new(
        ScrollConfig::default(),
        sim.source(),
        sim.clock(),
        sim.multiplexer(),
        RecordingSink::new(),
    )
    .unwrap()
}

fn notch(at_ms: u64, code: u16, value: i32) -> [ScriptedEvent; 2] {
    [
        ScriptedEvent::new(at_ms * MS, RawEvent::rel(code, value)),
        ScriptedEvent::new(at_ms * MS, RawEvent::syn_report()),
    ]
}

#[test]
fn deadlines_stay_on_the_grid_despite_wake_latency() {
    let sim = Simulation::new(Vec::new(), 100 * MS).with_wake_latency(1_500_000);
    let mut reactor = reactor(&sim);
    let summary = reactor.run().unwrap();

    let armed = sim.armed_log();
    assert!(!armed.is_empty());
    for (k, deadline) in armed.iter().enumerate() {
        assert_eq!(*deadline, (k as u64 + 1) * 4 * MS);
    }
    // Deadlines 4ms..=96ms are serviced before the 100ms horizon.
    assert_eq!(summary.stats.ticks, 24);
    assert_eq!(reactor.schedule().ticks(), 24);
}

#[test]
fn all_queued_input_is_drained_per_wake() {
    let mut script = Vec::new();
    script.extend(notch(10, REL_WHEEL, 1));
    script.push(ScriptedEvent::new(10 * MS, RawEvent::rel(REL_X, 3)));
    script.push(ScriptedEvent::new(10 * MS, RawEvent::syn_report()));
    script.extend(notch(10, REL_HWHEEL, -1));

    let sim = Simulation::new(script, 200 * MS);
    let mut reactor = reactor(&sim);
    let summary = reactor.run().unwrap();

    assert_eq!(sim.unread(), 0);
    assert_eq!(summary.stats.impulses, 2);
    assert_eq!(summary.stats.forwarded, 1);
}

#[test]
fn lost_source_terminates_the_loop() {
    let sim = Simulation::new(notch(5, REL_WHEEL, 1).to_vec(), 30 * MS);
    let mut reactor = reactor(&sim);
    assert_eq!(reactor.state(), LoopState::Running);

    let summary = reactor.run().unwrap();

    assert!(matches!(summary.reason, StopReason::SourceLost(_)));
    assert_eq!(reactor.state(), LoopState::Terminated);
    assert_eq!(sim.now_ns(), 30 * MS);
}

#[test]
fn stop_flag_ends_the_run_at_the_signal() {
    let sim = Simulation::new(notch(5, REL_WHEEL, 2).to_vec(), 1_000 * MS);
    let mut reactor = reactor(&sim);
    sim.stop_at(50 * MS, reactor.stop_flag());

    let summary = reactor.run().unwrap();

    assert_eq!(summary.reason, StopReason::Requested);
    assert_eq!(sim.now_ns(), 50 * MS);
    assert_eq!(summary.stats.ticks, 12);
}

#[test]
fn stop_requested_before_run_exits_on_first_wake() {
    let sim = Simulation::new(Vec::new(), 1_000 * MS);
    let mut reactor = reactor(&sim);
    reactor.stop();

    let summary = reactor.run().unwrap();

    assert_eq!(summary.reason, StopReason::Requested);
    assert_eq!(summary.stats.ticks, 0);
    assert_eq!(sim.wakes(), 1);
}

#[test]
fn interrupted_wakes_change_nothing() {
    let script: Vec<ScriptedEvent> = [notch(0, REL_WHEEL, 1), notch(30, REL_WHEEL, 1)]
        .into_iter()
        .flatten()
        .collect();

    let quiet = Simulation::new(script.clone(), 600 * MS);
    let mut quiet_reactor = reactor(&quiet);
    let quiet_summary = quiet_reactor.run().unwrap();

    let noisy = Simulation::new(script, 600 * MS);
    noisy.interrupt_at(10 * MS);
    noisy.interrupt_at(10 * MS + 1);
    noisy.interrupt_at(33 * MS);
    let mut noisy_reactor = reactor(&noisy);
    let noisy_summary = noisy_reactor.run().unwrap();

    assert_eq!(quiet_summary, noisy_summary);
    assert_eq!(quiet.armed_log(), noisy.armed_log());
    assert_eq!(
        quiet_reactor.into_sink().frames(),
        noisy_reactor.into_sink().frames()
    );
    assert_eq!(noisy.wakes(), quiet.wakes() + 3);
}

#[test]
fn single_notch_glides_to_rest() {
    let (summary, sink) = simulate(
        ScrollConfig::default(),
        notch(0, REL_WHEEL, 1).to_vec(),
        2_000 * MS,
    )
    .unwrap();

    let total = sink.total_for_code(REL_WHEEL_HI_RES);
    assert!(total > 50 && total <= 60, "total={total}");
    assert_eq!(sink.total_for_code(REL_WHEEL), 0);
    assert!(sink.frames().iter().all(|f| !f.is_empty()));
    assert_eq!(summary.stats.frames, sink.frames().len() as u64);
    assert!(matches!(summary.reason, StopReason::SourceLost(_)));
}

#[test]
fn external_stop_flag_is_shared() {
    let sim = Simulation::new(Vec::new(), 1_000 * MS);
    let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut reactor = reactor(&sim).with_stop_flag(flag.clone());
    sim.stop_at(22 * MS, flag);

    let summary = reactor.run().unwrap();
    assert_eq!(summary.reason, StopReason::Requested);
    assert_eq!(summary.stats.ticks, 5);
}

proptest! {
    #[test]
    fn ticks_and_reads_are_complete_for_any_script(
        arrivals in proptest::collection::vec((0u64..400, -3i32..=3), 0..40),
        latency_us in 0u64..3_000,
    ) {
        let script: Vec<ScriptedEvent> = arrivals
            .iter()
            .flat_map(|(at_ms, v)| notch(*at_ms, REL_WHEEL, *v))
            .collect();
        let sim = Simulation::new(script, 500 * MS).with_wake_latency(latency_us * 1_000);
        let mut reactor = reactor(&sim);
        let summary = reactor.run().unwrap();

        prop_assert_eq!(sim.unread(), 0);
        prop_assert_eq!(summary.stats.impulses, arrivals.len() as u64);
        for (k, deadline) in sim.armed_log().iter().enumerate() {
            prop_assert_eq!(*deadline, (k as u64 + 1) * 4 * MS);
        }
    }
}
