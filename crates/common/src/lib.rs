//! smoothwheel Common Utilities
//!
//! Shared infrastructure for all smoothwheel crates:
//! - Error types and result aliases
//! - Monotonic timestamps and absolute tick scheduling
//! - Tracing/logging initialization
//! - Configuration loading and clamping

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
