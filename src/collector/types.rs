//! Privacy-preserving event types for key capture.
//!
//! These types capture ONLY timing and transition direction - never key identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A keyboard event capturing only timing information.
///
/// Privacy guarantee: No key codes, characters, or any content is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Whether this is a key press (true) or release (false)
    pub is_key_down: bool,
}

impl KeyboardEvent {
    pub fn new(is_key_down: bool) -> Self {
        Self::at(Utc::now(), is_key_down)
    }

    /// Create an event with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>, is_key_down: bool) -> Self {
        Self {
            timestamp,
            is_key_down,
        }
    }

    pub fn press(timestamp: DateTime<Utc>) -> Self {
        Self::at(timestamp, true)
    }

    pub fn release(timestamp: DateTime<Utc>) -> Self {
        Self::at(timestamp, false)
    }
}

/// Errors that can occur while initializing key capture.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Input Monitoring permission not granted")]
    PermissionDenied,
    #[error("Failed to create CGEvent tap")]
    TapCreationFailed,
    #[error("Failed to create run loop source")]
    RunLoopSourceFailed,
    #[error("Failed to install keyboard hook")]
    HookInstallationFailed,
    #[error("Global key capture is not supported on this platform")]
    Unsupported,
    #[error("Capture thread did not report readiness in time")]
    StartupTimedOut,
}
