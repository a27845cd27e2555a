//! Privacy-preserving transparency log.
//!
//! This module tracks and exposes statistics about what the engine observed
//! during a run, without storing any key identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency statistics for the current run.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Keystrokes counted from the capture adapter
    captured_keystrokes: AtomicU64,
    /// Keystrokes entered through the manual fallback
    manual_keystrokes: AtomicU64,
    /// Presses dropped by the debounce policy
    debounced_presses: AtomicU64,
    /// Capture errors reported to the presentation layer
    monitor_errors: AtomicU64,
    /// Times capture came back after being degraded
    recoveries: AtomicU64,
    /// Capture reinitialization attempts
    retry_attempts: AtomicU64,
    /// Saves that failed and were queued for retry
    failed_saves: AtomicU64,
    /// Run start time
    session_start: DateTime<Utc>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            captured_keystrokes: AtomicU64::new(0),
            manual_keystrokes: AtomicU64::new(0),
            debounced_presses: AtomicU64::new(0),
            monitor_errors: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            failed_saves: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_captured_keystroke(&self) {
        self.captured_keystrokes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manual_keystroke(&self) {
        self.manual_keystrokes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_debounced_press(&self) {
        self.debounced_presses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_monitor_error(&self) {
        self.monitor_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_save(&self) {
        self.failed_saves.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            captured_keystrokes: self.captured_keystrokes.load(Ordering::Relaxed),
            manual_keystrokes: self.manual_keystrokes.load(Ordering::Relaxed),
            debounced_presses: self.debounced_presses.load(Ordering::Relaxed),
            monitor_errors: self.monitor_errors.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            failed_saves: self.failed_saves.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Captured keystrokes: {}\n\
             - Manual keystrokes: {}\n\
             - Repeats ignored: {}\n\
             - Capture errors reported: {} (recovered {})\n\
             - Capture retries: {}\n\
             - Failed saves: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No key content captured\n\
             - Only key transition timing observed",
            stats.captured_keystrokes,
            stats.manual_keystrokes,
            stats.debounced_presses,
            stats.monitor_errors,
            stats.recoveries,
            stats.retry_attempts,
            stats.failed_saves,
            stats.session_duration_secs
        )
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub captured_keystrokes: u64,
    pub manual_keystrokes: u64,
    pub debounced_presses: u64,
    pub monitor_errors: u64,
    pub recoveries: u64,
    pub retry_attempts: u64,
    pub failed_saves: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}
