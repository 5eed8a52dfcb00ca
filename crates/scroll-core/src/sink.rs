//! Output side of the engine.
//!
//! A sink receives records and frame terminators. Records written between
//! two terminators form one frame that downstream consumers see atomically.

use smoothwheel_common::error::SmoothResult;

use crate::axis::AxisEmission;
use crate::event::{Axis, RawEvent};

/// Destination for shaped output.
pub trait EventSink {
    /// Queue one record for the current frame.
    fn write_event(&mut self, event: RawEvent) -> SmoothResult<()>;

    /// Close the current frame with a terminator.
    fn end_frame(&mut self) -> SmoothResult<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn write_event(&mut self, event: RawEvent) -> SmoothResult<()> {
        (**self).write_event(event)
    }

    fn end_frame(&mut self) -> SmoothResult<()> {
        (**self).end_frame()
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn write_event(&mut self, event: RawEvent) -> SmoothResult<()> {
        (**self).write_event(event)
    }

    fn end_frame(&mut self) -> SmoothResult<()> {
        (**self).end_frame()
    }
}

/// Translate one axis emission into output records.
///
/// The fine record comes first, followed by one ±1 coarse record per
/// whole notch, matching what hi-res wheel drivers send.
pub fn write_emission<S: EventSink + ?Sized>(
    sink: &mut S,
    axis: Axis,
    emission: AxisEmission,
) -> SmoothResult<()> {
    if emission.fine != 0 {
        sink.write_event(RawEvent::rel(axis.fine_code(), emission.fine))?;
    }
    let step = emission.coarse.signum();
    for _ in 0..emission.coarse.abs() {
        sink.write_event(RawEvent::rel(axis.coarse_code(), step))?;
    }
    Ok(())
}

/// In-memory sink that keeps every closed frame.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    frames: Vec<Vec<RawEvent>>,
    pending: Vec<RawEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed frames, oldest first.
    pub fn frames(&self) -> &[Vec<RawEvent>] {
        &self.frames
    }

    /// Records written since the last terminator.
    pub fn pending(&self) -> &[RawEvent] {
        &self.pending
    }

    /// All records in closed frames.
    pub fn records(&self) -> impl Iterator<Item = &RawEvent> {
        self.frames.iter().flatten()
    }

    /// Sum of the values of every closed record with `code`.
    pub fn total_for_code(&self, code: u16) -> i64 {
        self.records()
            .filter(|e| e.event_type == crate::event::EV_REL && e.code == code)
            .map(|e| i64::from(e.value))
            .sum()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.pending.clear();
    }
}

impl EventSink for RecordingSink {
    fn write_event(&mut self, event: RawEvent) -> SmoothResult<()> {
        self.pending.push(event);
        Ok(())
    }

    fn end_frame(&mut self) -> SmoothResult<()> {
        self.frames.push(std::mem::take(&mut self.pending));
        Ok(())
    }
}
