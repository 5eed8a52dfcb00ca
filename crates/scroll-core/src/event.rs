//! Input event records and scroll classification.
//!
//! Records mirror the kernel's `input_event` payload: a type, a code, and a
//! signed value. Only the four relative wheel codes are intercepted; every
//! other record is forwarded verbatim.

use serde::{Deserialize, Serialize};

/// `EV_SYN`
pub const EV_SYN: u16 = 0x00;
/// `EV_KEY`
pub const EV_KEY: u16 = 0x01;
/// `EV_REL`
pub const EV_REL: u16 = 0x02;

/// `SYN_REPORT`
pub const SYN_REPORT: u16 = 0x00;

/// `REL_X`
pub const REL_X: u16 = 0x00;
/// `REL_Y`
pub const REL_Y: u16 = 0x01;
/// `REL_HWHEEL`
pub const REL_HWHEEL: u16 = 0x06;
/// `REL_WHEEL`
pub const REL_WHEEL: u16 = 0x08;
/// `REL_WHEEL_HI_RES`
pub const REL_WHEEL_HI_RES: u16 = 0x0b;
/// `REL_HWHEEL_HI_RES`
pub const REL_HWHEEL_HI_RES: u16 = 0x0c;

/// One `(type, code, value)` input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    /// A relative-axis record.
    pub fn rel(code: u16, value: i32) -> Self {
        Self::new(EV_REL, code, value)
    }

    /// The `SYN_REPORT` frame terminator.
    pub fn syn_report() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    /// Route this record.
    pub fn classify(&self) -> EventClass {
        match (self.event_type, self.code) {
            (EV_SYN, SYN_REPORT) => EventClass::FrameTerminator,
            (EV_REL, REL_WHEEL) => EventClass::VerticalCoarse,
            (EV_REL, REL_WHEEL_HI_RES) => EventClass::VerticalFine,
            (EV_REL, REL_HWHEEL) => EventClass::HorizontalCoarse,
            (EV_REL, REL_HWHEEL_HI_RES) => EventClass::HorizontalFine,
            _ => EventClass::PassThrough,
        }
    }
}

/// Scroll axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Vertical, Axis::Horizontal];

    /// Output code for fine-grained (1/120) units.
    pub fn fine_code(self) -> u16 {
        match self {
            Axis::Vertical => REL_WHEEL_HI_RES,
            Axis::Horizontal => REL_HWHEEL_HI_RES,
        }
    }

    /// Output code for legacy whole-notch units.
    pub fn coarse_code(self) -> u16 {
        match self {
            Axis::Vertical => REL_WHEEL,
            Axis::Horizontal => REL_HWHEEL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::Vertical => "vert",
            Axis::Horizontal => "horiz",
        }
    }
}

/// What the engine does with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    VerticalCoarse,
    VerticalFine,
    HorizontalCoarse,
    HorizontalFine,
    PassThrough,
    FrameTerminator,
}

impl EventClass {
    /// Axis and granularity for scroll classes.
    ///
    /// Returns `(axis, is_fine)`.
    pub fn scroll_axis(self) -> Option<(Axis, bool)> {
        match self {
            EventClass::VerticalCoarse => Some((Axis::Vertical, false)),
            EventClass::VerticalFine => Some((Axis::Vertical, true)),
            EventClass::HorizontalCoarse => Some((Axis::Horizontal, false)),
            EventClass::HorizontalFine => Some((Axis::Horizontal, true)),
            EventClass::PassThrough | EventClass::FrameTerminator => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_scroll_codes() {
        assert_eq!(
            RawEvent::rel(REL_WHEEL, 1).classify(),
            EventClass::VerticalCoarse
        );
        assert_eq!(
            RawEvent::rel(REL_WHEEL_HI_RES, 15).classify(),
            EventClass::VerticalFine
        );
        assert_eq!(
            RawEvent::rel(REL_HWHEEL, -1).classify(),
            EventClass::HorizontalCoarse
        );
        assert_eq!(
            RawEvent::rel(REL_HWHEEL_HI_RES, -30).classify(),
            EventClass::HorizontalFine
        );
    }

    #[test]
    fn test_classify_other_records() {
        assert_eq!(
            RawEvent::syn_report().classify(),
            EventClass::FrameTerminator
        );
        assert_eq!(RawEvent::rel(REL_X, 3).classify(), EventClass::PassThrough);
        // BTN_LEFT press
        assert_eq!(
            RawEvent::new(EV_KEY, 0x110, 1).classify(),
            EventClass::PassThrough
        );
        // SYN_DROPPED is forwarded, not treated as a frame end.
        assert_eq!(
            RawEvent::new(EV_SYN, 3, 0).classify(),
            EventClass::PassThrough
        );
        // Wheel code under a non-relative type is not scroll.
        assert_eq!(
            RawEvent::new(EV_KEY, REL_WHEEL, 1).classify(),
            EventClass::PassThrough
        );
    }

    #[test]
    fn test_axis_codes_are_paired() {
        assert_eq!(Axis::Vertical.fine_code(), REL_WHEEL_HI_RES);
        assert_eq!(Axis::Vertical.coarse_code(), REL_WHEEL);
        assert_eq!(Axis::Horizontal.fine_code(), REL_HWHEEL_HI_RES);
        assert_eq!(Axis::Horizontal.coarse_code(), REL_HWHEEL);
        for axis in Axis::ALL {
            let class = RawEvent::rel(axis.fine_code(), 1).classify();
            assert_eq!(class.scroll_axis(), Some((axis, true)));
        }
    }
}
