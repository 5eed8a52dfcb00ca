//! Replay wheel input through the engine in virtual time.
//!
//! Useful for tuning: no device access is needed and the output is
//! deterministic for a given script and configuration.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use smoothwheel_common::config::ScrollConfig;
use smoothwheel_event_loop::sim::{simulate, ScriptedEvent};
use smoothwheel_event_loop::StopReason;
use smoothwheel_scroll_core::event::{REL_HWHEEL, REL_HWHEEL_HI_RES, REL_WHEEL, REL_WHEEL_HI_RES};
use smoothwheel_scroll_core::{EngineStats, RawEvent, UNITS_PER_COARSE};

use crate::ScrollOverrides;

const MS: u64 = 1_000_000;
/// Virtual time allowed for the last glide to settle.
const SETTLE_MS: u64 = 3_000;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of wheel notches to send
    #[arg(long, default_value = "10")]
    notches: u32,

    /// Time between notches in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Notch value (negative scrolls the other way)
    #[arg(long, default_value = "1", allow_hyphen_values = true)]
    value: i32,

    /// Scroll the horizontal axis
    #[arg(long)]
    horizontal: bool,

    /// Send hi-res records (value * 120) instead of coarse notches
    #[arg(long)]
    hi_res: bool,

    /// Replay a JSON array of {"at_ns", "type", "code", "value"} records
    /// instead of generating notches
    #[arg(long)]
    script: Option<PathBuf>,

    /// Virtual run length in milliseconds (default: last input + 3s)
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Include every output frame in the report
    #[arg(long)]
    frames: bool,

    #[command(flatten)]
    scroll: ScrollOverrides,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
struct AxisTotals {
    vertical_fine: i64,
    vertical_coarse: i64,
    horizontal_fine: i64,
    horizontal_coarse: i64,
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a ScrollConfig,
    input_events: usize,
    duration_ms: u64,
    stop_reason: String,
    stats: EngineStats,
    totals: AxisTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<&'a [Vec<RawEvent>]>,
}

pub fn run(args: SimulateArgs, base: &ScrollConfig) -> anyhow::Result<()> {
    let config = args.scroll.apply(base);

    let script = match args.script {
        Some(ref path) => load_script(path)?,
        None => synthetic_script(&args),
    };
    let last_input = script.iter().map(|s| s.at_ns).max().unwrap_or(0);
    let until_ns = args
        .duration_ms
        .map(|ms| ms * MS)
        .unwrap_or(last_input + SETTLE_MS * MS);

    let input_events = script.len();
    let (summary, sink) = simulate(config.clone(), script, until_ns)?;

    let totals = AxisTotals {
        vertical_fine: sink.total_for_code(REL_WHEEL_HI_RES),
        vertical_coarse: sink.total_for_code(REL_WHEEL),
        horizontal_fine: sink.total_for_code(REL_HWHEEL_HI_RES),
        horizontal_coarse: sink.total_for_code(REL_HWHEEL),
    };
    let stop_reason = match summary.reason {
        StopReason::Requested => "requested".to_string(),
        StopReason::SourceLost(_) => "end_of_input".to_string(),
    };

    let report = Report {
        config: &config,
        input_events,
        duration_ms: until_ns / MS,
        stop_reason,
        stats: summary.stats,
        totals,
        frames: args.frames.then(|| sink.frames()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_script(path: &PathBuf) -> anyhow::Result<Vec<ScriptedEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse script '{}'", path.display()))
}

/// Evenly spaced notches, each followed by a frame terminator.
fn synthetic_script(args: &SimulateArgs) -> Vec<ScriptedEvent> {
    let code = match (args.horizontal, args.hi_res) {
        (false, false) => REL_WHEEL,
        (false, true) => REL_WHEEL_HI_RES,
        (true, false) => REL_HWHEEL,
        (true, true) => REL_HWHEEL_HI_RES,
    };
    let value = if args.hi_res {
        args.value.saturating_mul(UNITS_PER_COARSE)
    } else {
        args.value
    };

    (0..u64::from(args.notches))
        .flat_map(|i| {
            let at_ns = i * args.interval_ms * MS;
            [
                ScriptedEvent::new(at_ns, RawEvent::rel(code, value)),
                ScriptedEvent::new(at_ns, RawEvent::syn_report()),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SimulateArgs {
        SimulateArgs {
            notches: 3,
            interval_ms: 50,
            value: -1,
            horizontal: false,
            hi_res: false,
            script: None,
            duration_ms: None,
            frames: false,
            scroll: ScrollOverrides::default(),
        }
    }

    #[test]
    fn test_synthetic_script_layout() {
        let script = synthetic_script(&args());
        assert_eq!(script.len(), 6);
        assert_eq!(script[2].at_ns, 50 * MS);
        assert_eq!(script[2].event, RawEvent::rel(REL_WHEEL, -1));
        assert_eq!(script[3].event, RawEvent::syn_report());
    }

    #[test]
    fn test_hi_res_horizontal_script() {
        let script = synthetic_script(&SimulateArgs {
            horizontal: true,
            hi_res: true,
            value: 2,
            ..args()
        });
        assert_eq!(script[0].event, RawEvent::rel(REL_HWHEEL_HI_RES, 240));
    }

    #[test]
    fn test_script_json_shape() {
        let parsed: Vec<ScriptedEvent> =
            serde_json::from_str(r#"[{"at_ns": 4000000, "type": 2, "code": 8, "value": 1}]"#)
                .unwrap();
        assert_eq!(parsed, vec![ScriptedEvent::new(4 * MS, RawEvent::rel(REL_WHEEL, 1))]);
    }

    #[test]
    fn test_load_missing_script_fails() {
        assert!(load_script(&PathBuf::from("/no/such/script.json")).is_err());
    }
}
