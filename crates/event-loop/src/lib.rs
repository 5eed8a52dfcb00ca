//! smoothwheel Event Loop
//!
//! A single-threaded reactor that multiplexes two event sources:
//!
//! - **Input:** the raw record stream of the grabbed device
//! - **Clock:** a periodic timer armed at absolute deadlines
//!
//! Each readiness notification runs to completion before the next wait, so
//! the engine state needs no locking. The platform pieces plug in through
//! the [`InputSource`], [`TickClock`] and [`Multiplexer`] traits; [`sim`]
//! provides a virtual-time implementation of all three.

pub mod sim;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smoothwheel_common::clock::{MonotonicNs, TickSchedule};
use smoothwheel_common::config::ScrollConfig;
use smoothwheel_common::error::SmoothResult;
use smoothwheel_scroll_core::{EngineStats, EventSink, RawEvent, ScrollEngine};

/// Non-blocking source of raw input records.
pub trait InputSource {
    /// Read the next queued record.
    ///
    /// Returns `Ok(None)` when nothing is queued right now. Any error ends
    /// the run.
    fn read_event(&mut self) -> SmoothResult<Option<RawEvent>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Periodic clock driven by absolute deadlines.
pub trait TickClock {
    /// Current monotonic time on the clock's timebase.
    fn now_ns(&self) -> MonotonicNs;

    /// Arm the clock to fire once at `deadline_ns`.
    fn arm_at(&mut self, deadline_ns: MonotonicNs) -> SmoothResult<()>;

    /// Clear the fired state. Returns the number of expirations read
    /// (0 if the wakeup was spurious).
    fn acknowledge(&mut self) -> SmoothResult<u64>;
}

/// Which sources are ready after a wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub input: bool,
    pub clock: bool,
}

impl Readiness {
    /// Woken by a signal with nothing ready.
    pub fn interrupted() -> Self {
        Self::default()
    }

    pub fn is_interrupted(&self) -> bool {
        !self.input && !self.clock
    }
}

/// Blocks until input or clock is ready, or a signal interrupts the wait.
pub trait Multiplexer {
    fn wait(&mut self) -> SmoothResult<Readiness>;
}

/// Reactor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Shutdown requested or source lost; the loop exits after the current
    /// dispatch.
    Stopping,
    Terminated,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was raised.
    Requested,
    /// The input source failed or reached end of stream.
    SourceLost(String),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: EngineStats,
}

/// The event loop that couples a source, a clock and a sink to the engine.
pub struct ScrollReactor<I, C, M, S> {
    source: I,
    clock: C,
    mux: M,
    sink: S,
    engine: ScrollEngine,
    schedule: TickSchedule,
    state: LoopState,
    stop_reason: Option<StopReason>,
    stop_flag: Arc<AtomicBool>,
}

impl<I, C, M, S> ScrollReactor<I, C, M, S>
where
    I: InputSource,
    C: TickClock,
    M: Multiplexer,
    S: EventSink,
{
    /// Create a reactor and arm the first tick one period from now.
    pub fn new(config: ScrollConfig, source: I, mut clock: C, mux: M, sink: S) -> SmoothResult<Self> {
        let schedule = TickSchedule::new(clock.now_ns(), config.tick_period());
        clock.arm_at(schedule.next_deadline())?;

        Ok(Self {
            source,
            clock,
            mux,
            sink,
            engine: ScrollEngine::new(config),
            schedule,
            state: LoopState::Running,
            stop_reason: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned shutdown flag (e.g. set by a signal handler).
    pub fn with_stop_flag(mut self, stop_flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = stop_flag;
        self
    }

    /// Run until shutdown is requested or the source is lost.
    pub fn run(&mut self) -> SmoothResult<RunSummary> {
        tracing::info!(
            source = %self.source.name(),
            tick_ms = self.engine.config().tick_ms,
            "Scroll smoothing active"
        );

        while self.state == LoopState::Running {
            let ready = self.mux.wait()?;

            if self.stop_flag.load(Ordering::Relaxed) {
                self.request_stop(StopReason::Requested);
                break;
            }
            if ready.is_interrupted() {
                continue;
            }

            if ready.input {
                self.drain_input();
            }
            if ready.clock {
                self.service_clock();
            }
        }

        self.state = LoopState::Terminated;
        let summary = RunSummary {
            reason: self
                .stop_reason
                .clone()
                .unwrap_or(StopReason::Requested),
            stats: self.engine.stats(),
        };
        tracing::info!(
            reason = ?summary.reason,
            impulses = summary.stats.impulses,
            ticks = summary.stats.ticks,
            fine_units = summary.stats.fine_units,
            frames = summary.stats.frames,
            write_errors = summary.stats.write_errors,
            "Event loop stopped"
        );
        Ok(summary)
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn engine(&self) -> &ScrollEngine {
        &self.engine
    }

    pub fn schedule(&self) -> &TickSchedule {
        &self.schedule
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take the sink back, e.g. to inspect recorded output.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn drain_input(&mut self) {
        loop {
            match self.source.read_event() {
                Ok(Some(event)) => {
                    let now = self.clock.now_ns();
                    self.engine.handle_input(event, now, &mut self.sink);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(source = %self.source.name(), error = %e, "Input source lost");
                    self.request_stop(StopReason::SourceLost(e.to_string()));
                    break;
                }
            }
        }
    }

    fn service_clock(&mut self) {
        match self.clock.acknowledge() {
            Ok(expirations) if expirations > 1 => {
                tracing::debug!(expirations, "Clock overran");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read clock expiration");
                return;
            }
        }

        let lag_ns = self.schedule.lag_ns(self.clock.now_ns());
        let deadline = self.schedule.advance();
        if let Err(e) = self.clock.arm_at(deadline) {
            tracing::warn!(error = %e, deadline, "Failed to rearm clock");
        }
        if lag_ns > self.schedule.period_ns() {
            tracing::trace!(lag_ns, "Tick serviced late");
        }

        self.engine.tick(&mut self.sink);
    }

    fn request_stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason);
        }
        self.state = LoopState::Stopping;
    }
}
