//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SmoothResult;

/// Default per-tick friction factor (tuned for a 250 Hz tick).
pub const DEFAULT_FRICTION: f64 = 0.078;
/// Default tick period in milliseconds.
pub const DEFAULT_TICK_MS: u32 = 4;
/// Input rate (events/sec) below which no dampening is applied.
pub const DEFAULT_LOW_RATE: f64 = 5.0;
/// Input rate (events/sec) above which maximum dampening is applied.
pub const DEFAULT_HIGH_RATE: f64 = 30.0;
/// Scale factor applied at or above the high rate.
pub const DEFAULT_MIN_SCALE: f64 = 0.3;
/// Velocity below which an axis stops.
pub const DEFAULT_STOP_THRESHOLD: f64 = 0.5;
/// Global scroll distance multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 0.5;

pub const FRICTION_BOUNDS: (f64, f64) = (0.01, 0.2);
pub const TICK_MS_BOUNDS: (u32, u32) = (1, 50);
pub const MULTIPLIER_BOUNDS: (f64, f64) = (0.01, 10.0);
pub const MIN_SCALE_BOUNDS: (f64, f64) = (0.0, 1.0);
pub const STOP_THRESHOLD_FLOOR: f64 = 0.01;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Scroll shaping parameters.
    pub scroll: ScrollConfig,

    /// Source device selection.
    pub device: DeviceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tunables consumed by the scroll engine.
///
/// Values are bounded by [`ScrollConfig::clamped`] before they reach the
/// engine; the engine itself never validates them again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollConfig {
    /// Fraction of velocity removed per tick.
    pub friction: f64,

    /// Tick period in milliseconds.
    pub tick_ms: u32,

    /// Events/sec at or below which input passes through unscaled.
    pub low_rate: f64,

    /// Events/sec at or above which `min_scale` applies.
    pub high_rate: f64,

    /// Scale factor for fast flicks.
    pub min_scale: f64,

    /// Velocity floor; below it an axis is considered stopped.
    pub stop_threshold: f64,

    /// Global distance multiplier applied to every impulse.
    pub multiplier: f64,

    /// Ignore coarse wheel events on an axis once it has reported
    /// hi-res events. Off by default; some drivers send both for the
    /// same motion.
    pub dedupe_coarse_when_fine: bool,
}

/// How the source device is located.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit device node. `None` means auto-detect.
    pub path: Option<PathBuf>,

    /// Case-insensitive name fragments used by auto-detection.
    pub keywords: Vec<String>,

    /// Delay between creating the virtual device and grabbing the source.
    pub settle_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "smoothwheel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            friction: DEFAULT_FRICTION,
            tick_ms: DEFAULT_TICK_MS,
            low_rate: DEFAULT_LOW_RATE,
            high_rate: DEFAULT_HIGH_RATE,
            min_scale: DEFAULT_MIN_SCALE,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            multiplier: DEFAULT_MULTIPLIER,
            dedupe_coarse_when_fine: false,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: None,
            keywords: vec![
                "spice".to_string(),
                "qemu".to_string(),
                "virtio".to_string(),
            ],
            settle_ms: 200,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ScrollConfig {
    /// Return a copy with every parameter forced into its valid range.
    ///
    /// Non-finite values fall back to the defaults. `high_rate` is pushed
    /// above `low_rate` so the dampening curve never divides by zero.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();

        let friction = bounded(self.friction, FRICTION_BOUNDS, defaults.friction);
        let tick_ms = self.tick_ms.clamp(TICK_MS_BOUNDS.0, TICK_MS_BOUNDS.1);
        let multiplier = bounded(self.multiplier, MULTIPLIER_BOUNDS, defaults.multiplier);
        let min_scale = bounded(self.min_scale, MIN_SCALE_BOUNDS, defaults.min_scale);

        let low_rate = finite_or(self.low_rate, defaults.low_rate).max(0.0);
        let mut high_rate = finite_or(self.high_rate, defaults.high_rate);
        if high_rate <= low_rate {
            high_rate = low_rate + 1.0;
        }

        let stop_threshold =
            finite_or(self.stop_threshold, defaults.stop_threshold).max(STOP_THRESHOLD_FLOOR);

        Self {
            friction,
            tick_ms,
            low_rate,
            high_rate,
            min_scale,
            stop_threshold,
            multiplier,
            dedupe_coarse_when_fine: self.dedupe_coarse_when_fine,
        }
    }

    /// Tick period as a duration.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_ms))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    ///
    /// Scroll parameters are clamped on the way in.
    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        Self::try_load_from(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
            Self::default()
        })
    }

    /// Load config from a file the user named; any failure is an error.
    pub fn try_load_from(config_path: &Path) -> SmoothResult<Self> {
        let content = std::fs::read_to_string(config_path)?;
        let mut config: AppConfig = serde_json::from_str(&content)?;
        config.scroll = config.scroll.clamped();
        Ok(config)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("smoothwheel").join("config.json")
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn bounded(value: f64, (lo, hi): (f64, f64), fallback: f64) -> f64 {
    finite_or(value, fallback).clamp(lo, hi)
}
