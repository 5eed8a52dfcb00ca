//! smoothwheel Scroll Core
//!
//! Turns coarse, quantized wheel input into fine-grained inertial output:
//! - **Rate Tracking:** events-per-second over a trailing window, per axis
//! - **Dampening:** non-linear mapping from input rate to impulse scale
//! - **Axis Integration:** velocity, exponential decay, sub-unit carry,
//!   and fine-to-coarse folding
//! - **Engine:** event routing and output frame batching
//!
//! This crate is pure computation with no I/O and no platform dependencies.
//! Timestamps come in as data and records go out through [`EventSink`].

pub mod axis;
pub mod curve;
pub mod engine;
pub mod event;
pub mod rate;
pub mod sink;

pub use axis::{AxisEmission, AxisState, MAX_VELOCITY, UNITS_PER_COARSE};
pub use curve::dampening_scale;
pub use engine::{EngineStats, ScrollEngine};
pub use event::{Axis, EventClass, RawEvent};
pub use rate::RateTracker;
pub use sink::{EventSink, RecordingSink};
