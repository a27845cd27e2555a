//! Messages exchanged with the presentation layer.
//!
//! Both directions are JSON objects tagged by `type`, one per line:
//!
//! ```text
//! presentation ──▶ {"type":"update-name","name":"Rex"}        ──▶ engine
//! presentation ◀── {"type":"stats-update","level":2,...}      ◀── engine
//! ```

use crate::core::{FailureKind, MonitorError, StatsSnapshot};
use serde::{Deserialize, Serialize};

/// Inbound command from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Manual fallback keystroke; same effect as a captured one
    Keystroke,
    /// Rename the pet; ignored if blank after trimming
    UpdateName { name: String },
    /// Wipe all progress and the saved file
    ResetData,
    /// Reinitialize key capture after a short delay
    RetryKeyboardMonitoring,
    /// Save and terminate
    ExitApp,
}

impl Command {
    /// Parse one line of input.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Outbound event to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Periodic state snapshot
    StatsUpdate(StatsSnapshot),
    /// Capture is presumed broken; offer manual input and retry
    #[serde(rename_all = "camelCase")]
    KeyboardMonitorError {
        message: String,
        reason: FailureKind,
        platform_hint: String,
    },
    /// Capture delivered an event after having been presumed broken
    KeystrokeAfterTimeout,
}

impl Notification {
    /// Serialize as a single line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<MonitorError> for Notification {
    fn from(error: MonitorError) -> Self {
        Notification::KeyboardMonitorError {
            message: error.message,
            reason: error.kind,
            platform_hint: error.platform_hint,
        }
    }
}
