//! Error types shared across smoothwheel crates.

use std::path::PathBuf;

/// Top-level error type for smoothwheel operations.
#[derive(Debug, thiserror::Error)]
pub enum SmoothError {
    #[error("Input device error: {message}")]
    Device { message: String },

    #[error("Virtual device error: {message}")]
    Uinput { message: String },

    #[error("Timer error: {message}")]
    Timer { message: String },

    #[error("Poll error: {message}")]
    Poll { message: String },

    /// The input source disappeared (hot-unplug, read error, end of stream).
    #[error("Input source lost: {message}")]
    SourceLost { message: String },

    #[error("Device not found: {path}")]
    DeviceNotFound { path: PathBuf },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SmoothError.
pub type SmoothResult<T> = Result<T, SmoothError>;

impl SmoothError {
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device {
            message: msg.into(),
        }
    }

    pub fn uinput(msg: impl Into<String>) -> Self {
        Self::Uinput {
            message: msg.into(),
        }
    }

    pub fn timer(msg: impl Into<String>) -> Self {
        Self::Timer {
            message: msg.into(),
        }
    }

    pub fn poll(msg: impl Into<String>) -> Self {
        Self::Poll {
            message: msg.into(),
        }
    }

    pub fn source_lost(msg: impl Into<String>) -> Self {
        Self::SourceLost {
            message: msg.into(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    /// Whether this error means the input stream is gone for good.
    pub fn is_source_lost(&self) -> bool {
        matches!(self, Self::SourceLost { .. })
    }
}
