//! Capture watchdog and fallback controller.
//!
//! The capture adapter can fail to start, or start and then never deliver
//! anything (a permission grant racing initialization is the usual cause).
//! The watchdog tells "nobody is typing" apart from "capture is broken"
//! purely from observed event timestamps:
//!
//! ```text
//!            silence_timeout with zero events          any raw event
//!  ACTIVE ─────────────────────────────────────▶ DEGRADED ─────────────▶ ACTIVE
//!    │          (or start/retry failure)            │    ▲  (recovered)
//!    │                                              │    │
//!    └──────────────── retry (scheduled) ◀──────────┘────┘
//! ```
//!
//! The watchdog is *armed* at start and after each successful
//! reinitialization. Any raw event disarms it.

use crate::config::BackoffConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture health as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Active,
    Degraded,
}

/// Why the watchdog entered degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adapter failed to initialize.
    CaptureUnavailable,
    /// The adapter initialized but delivered nothing within the timeout.
    CaptureSilent,
}

/// Structured error handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorError {
    pub kind: FailureKind,
    pub message: String,
    pub platform_hint: String,
}

/// Something the runtime must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogSignal {
    /// Notify the presentation layer that capture is not working.
    Degraded(MonitorError),
    /// Capture delivered an event while degraded.
    Recovered,
    /// Tear down and reinitialize the capture adapter now.
    RetryDue,
}

/// Exponential retry delays.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl RetryBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay for the next attempt: `initial * multiplier^attempt`, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self
            .config
            .multiplier
            .max(1)
            .checked_pow(self.attempt)
            .unwrap_or(u32::MAX);
        let delay = self
            .config
            .initial
            .checked_mul(factor)
            .unwrap_or(self.config.max)
            .min(self.config.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Watchdog settings.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub silence_timeout: Duration,
    pub auto_retry: bool,
    pub backoff: BackoffConfig,
    pub platform_hint: String,
}

/// The fallback state machine.
#[derive(Debug, Clone)]
pub struct Watchdog {
    silence_timeout: chrono::Duration,
    auto_retry: bool,
    platform_hint: String,
    state: WatchState,
    /// Set while waiting for the first event since start or reinitialization
    armed_at: Option<DateTime<Utc>>,
    pending_retry_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
    backoff: RetryBackoff,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            silence_timeout: to_chrono(config.silence_timeout),
            auto_retry: config.auto_retry,
            platform_hint: config.platform_hint,
            state: WatchState::Active,
            armed_at: None,
            pending_retry_at: None,
            last_event_at: None,
            backoff: RetryBackoff::new(config.backoff),
        }
    }

    /// Capture (re)initialized successfully; start waiting for its first event.
    ///
    /// A degraded watchdog stays degraded until an event actually arrives.
    pub fn capture_started(&mut self, now: DateTime<Utc>) {
        self.armed_at = Some(now);
    }

    /// Capture failed to initialize or stopped on its own.
    ///
    /// Always returns a notification, even when already degraded, so every
    /// failed retry is reported.
    pub fn capture_failed(&mut self, now: DateTime<Utc>, reason: &str) -> WatchdogSignal {
        self.armed_at = None;
        if self.state == WatchState::Active {
            tracing::warn!("Keyboard monitoring degraded: {reason}");
        }
        self.state = WatchState::Degraded;
        self.schedule_auto_retry(now);
        WatchdogSignal::Degraded(MonitorError {
            kind: FailureKind::CaptureUnavailable,
            message: format!("Keyboard monitoring unavailable: {reason}"),
            platform_hint: self.platform_hint.clone(),
        })
    }

    /// A raw capture event (press or release) was observed.
    pub fn observe_event(&mut self, now: DateTime<Utc>) -> Option<WatchdogSignal> {
        self.last_event_at = Some(now);
        self.armed_at = None;
        if self.state == WatchState::Degraded {
            tracing::info!("Keyboard monitoring recovered");
            self.state = WatchState::Active;
            self.pending_retry_at = None;
            self.backoff.reset();
            return Some(WatchdogSignal::Recovered);
        }
        None
    }

    /// Check timers. Call on a fixed cadence.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<WatchdogSignal> {
        let mut signals = Vec::new();

        if let Some(armed_at) = self.armed_at {
            if now - armed_at >= self.silence_timeout {
                self.armed_at = None;
                self.schedule_auto_retry(now);
                if self.state == WatchState::Active {
                    self.state = WatchState::Degraded;
                    let secs = self.silence_timeout.num_seconds();
                    tracing::warn!("No key events within {secs}s, assuming capture is broken");
                    signals.push(WatchdogSignal::Degraded(MonitorError {
                        kind: FailureKind::CaptureSilent,
                        message: format!(
                            "No keyboard activity detected for {secs} seconds; keyboard monitoring may not be working"
                        ),
                        platform_hint: self.platform_hint.clone(),
                    }));
                }
            }
        }

        if let Some(retry_at) = self.pending_retry_at {
            if now >= retry_at {
                self.pending_retry_at = None;
                signals.push(WatchdogSignal::RetryDue);
            }
        }

        signals
    }

    /// Schedule a retry `delay` from now, unless one is already due sooner.
    pub fn request_retry(&mut self, now: DateTime<Utc>, delay: Duration) {
        let at = now + to_chrono(delay);
        self.pending_retry_at = Some(match self.pending_retry_at {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
    }

    fn schedule_auto_retry(&mut self, now: DateTime<Utc>) {
        if !self.auto_retry {
            return;
        }
        let delay = self.backoff.next_delay();
        tracing::debug!("Next capture retry in {}s", delay.as_secs());
        self.request_retry(now, delay);
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.state == WatchState::Degraded
    }

    pub fn pending_retry_at(&self) -> Option<DateTime<Utc>> {
        self.pending_retry_at
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }
}

/// Convert, capping absurd values instead of panicking.
fn to_chrono(duration: Duration) -> chrono::Duration {
    const MAX_MS: u128 = 1_000_000_000_000;
    chrono::Duration::milliseconds(duration.as_millis().min(MAX_MS) as i64)
}
