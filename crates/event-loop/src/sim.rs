//! Virtual-time backends for the reactor.
//!
//! A [`Simulation`] replays a timestamped input script against a virtual
//! monotonic clock. Time only moves when the multiplexer waits, and it jumps
//! straight to the next interesting instant: a script arrival, the armed
//! deadline (plus an optional wake latency), or a scheduled signal. Once the
//! horizon is reached the source reports end of stream, which ends the run.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smoothwheel_common::clock::MonotonicNs;
use smoothwheel_common::config::ScrollConfig;
use smoothwheel_common::error::{SmoothError, SmoothResult};
use smoothwheel_scroll_core::{RawEvent, RecordingSink};

use crate::{InputSource, Multiplexer, Readiness, RunSummary, ScrollReactor, TickClock};

/// One scripted input record and the time it becomes readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    pub at_ns: MonotonicNs,
    #[serde(flatten)]
    pub event: RawEvent,
}

impl ScriptedEvent {
    pub fn new(at_ns: MonotonicNs, event: RawEvent) -> Self {
        Self { at_ns, event }
    }
}

struct Signal {
    at_ns: MonotonicNs,
    raise: Option<Arc<AtomicBool>>,
}

#[derive(Default)]
struct SimState {
    now: MonotonicNs,
    until: MonotonicNs,
    wake_latency_ns: u64,
    script: VecDeque<ScriptedEvent>,
    readable: VecDeque<RawEvent>,
    signals: VecDeque<Signal>,
    armed: Option<MonotonicNs>,
    expirations: u64,
    armed_log: Vec<MonotonicNs>,
    wakes: u64,
    exhausted: bool,
}

impl SimState {
    fn next_wake(&self) -> Option<MonotonicNs> {
        let arrival = self.script.front().map(|s| s.at_ns);
        let clock = self.armed.map(|d| d.saturating_add(self.wake_latency_ns));
        let signal = self.signals.front().map(|s| s.at_ns);
        [arrival, clock, signal].into_iter().flatten().min()
    }

    fn advance_to(&mut self, t: MonotonicNs) {
        self.now = self.now.max(t);
        while self.script.front().is_some_and(|s| s.at_ns <= self.now) {
            if let Some(scripted) = self.script.pop_front() {
                self.readable.push_back(scripted.event);
            }
        }
        if let Some(deadline) = self.armed {
            if deadline.saturating_add(self.wake_latency_ns) <= self.now {
                self.armed = None;
                self.expirations += 1;
            }
        }
    }

    fn readiness(&self) -> Readiness {
        Readiness {
            input: !self.readable.is_empty(),
            clock: self.expirations > 0,
        }
    }
}

/// Shared virtual world for one simulated run.
#[derive(Clone, Default)]
pub struct Simulation {
    state: Rc<RefCell<SimState>>,
}

impl Simulation {
    /// Replay `script` until `until_ns`. The script is sorted by time.
    pub fn new(mut script: Vec<ScriptedEvent>, until_ns: MonotonicNs) -> Self {
        script.sort_by_key(|s| s.at_ns);
        let state = SimState {
            until: until_ns,
            script: script.into(),
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Delay every clock wakeup by `latency_ns` past its deadline.
    pub fn with_wake_latency(self, latency_ns: u64) -> Self {
        self.state.borrow_mut().wake_latency_ns = latency_ns;
        self
    }

    /// Deliver a signal at `at_ns` that interrupts the wait without
    /// making anything ready.
    pub fn interrupt_at(&self, at_ns: MonotonicNs) {
        self.push_signal(Signal { at_ns, raise: None });
    }

    /// Deliver a signal at `at_ns` that also raises `flag`.
    pub fn stop_at(&self, at_ns: MonotonicNs, flag: Arc<AtomicBool>) {
        self.push_signal(Signal {
            at_ns,
            raise: Some(flag),
        });
    }

    fn push_signal(&self, signal: Signal) {
        let mut state = self.state.borrow_mut();
        let pos = state
            .signals
            .iter()
            .position(|s| s.at_ns > signal.at_ns)
            .unwrap_or(state.signals.len());
        state.signals.insert(pos, signal);
    }

    pub fn source(&self) -> SimSource {
        SimSource {
            state: self.state.clone(),
        }
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            state: self.state.clone(),
        }
    }

    pub fn multiplexer(&self) -> SimMultiplexer {
        SimMultiplexer {
            state: self.state.clone(),
        }
    }

    pub fn now_ns(&self) -> MonotonicNs {
        self.state.borrow().now
    }

    /// Every deadline the clock was armed for, in order.
    pub fn armed_log(&self) -> Vec<MonotonicNs> {
        self.state.borrow().armed_log.clone()
    }

    /// Number of multiplexer waits that returned.
    pub fn wakes(&self) -> u64 {
        self.state.borrow().wakes
    }

    /// Records that arrived but were never read.
    pub fn unread(&self) -> usize {
        self.state.borrow().readable.len()
    }
}

/// Input side of a [`Simulation`].
pub struct SimSource {
    state: Rc<RefCell<SimState>>,
}

impl InputSource for SimSource {
    fn read_event(&mut self) -> SmoothResult<Option<RawEvent>> {
        let mut state = self.state.borrow_mut();
        if let Some(event) = state.readable.pop_front() {
            return Ok(Some(event));
        }
        if state.exhausted {
            return Err(SmoothError::source_lost("end of script"));
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "simulation"
    }
}

/// Clock side of a [`Simulation`].
pub struct SimClock {
    state: Rc<RefCell<SimState>>,
}

impl TickClock for SimClock {
    fn now_ns(&self) -> MonotonicNs {
        self.state.borrow().now
    }

    fn arm_at(&mut self, deadline_ns: MonotonicNs) -> SmoothResult<()> {
        let mut state = self.state.borrow_mut();
        state.armed = Some(deadline_ns);
        state.armed_log.push(deadline_ns);
        Ok(())
    }

    fn acknowledge(&mut self) -> SmoothResult<u64> {
        let mut state = self.state.borrow_mut();
        Ok(std::mem::take(&mut state.expirations))
    }
}

/// Multiplexer side of a [`Simulation`].
pub struct SimMultiplexer {
    state: Rc<RefCell<SimState>>,
}

impl Multiplexer for SimMultiplexer {
    fn wait(&mut self) -> SmoothResult<Readiness> {
        let mut state = self.state.borrow_mut();
        state.wakes += 1;

        loop {
            let ready = state.readiness();
            if ready.input || ready.clock {
                return Ok(ready);
            }
            if state.exhausted {
                // Hangup stays readable, like a closed descriptor.
                return Ok(Readiness {
                    input: true,
                    clock: false,
                });
            }

            match state.next_wake() {
                Some(t) if t <= state.until => {
                    state.advance_to(t);
                    if state.signals.front().is_some_and(|s| s.at_ns <= state.now) {
                        if let Some(signal) = state.signals.pop_front() {
                            if let Some(flag) = signal.raise {
                                flag.store(true, Ordering::SeqCst);
                            }
                        }
                        return Ok(Readiness::interrupted());
                    }
                }
                _ => {
                    let until = state.until;
                    state.advance_to(until);
                    state.exhausted = true;
                }
            }
        }
    }
}

/// Run a scripted session through the reactor in virtual time.
///
/// Returns the run summary together with every frame the engine wrote.
pub fn simulate(
    config: ScrollConfig,
    script: Vec<ScriptedEvent>,
    until_ns: MonotonicNs,
) -> SmoothResult<(RunSummary, RecordingSink)> {
    let sim = Simulation::new(script, until_ns);
    let mut reactor = ScrollReactor::new(
        config,
        sim.source(),
        sim.clock(),
        sim.multiplexer(),
        RecordingSink::new(),
    )?;
    let summary = reactor.run()?;
    Ok((summary, reactor.into_sink()))
}
