//! Key capture for keypet.
//!
//! This module provides platform-specific implementations for observing
//! system-wide key transitions in a privacy-preserving manner. Every
//! implementation sits behind [`KeySource`] so the runtime can tear down and
//! reinitialize capture without knowing which platform it runs on.

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

use crossbeam_channel::Receiver;
use std::time::Duration;

// Re-export commonly used types
pub use types::{CollectorError, KeyboardEvent};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, platform_hint, MacOSCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(target_os = "windows")]
pub use self::windows::{check_permission, platform_hint, WindowsCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "windows")]
pub type Collector = WindowsCollector;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, platform_hint, NoopCollector};

/// Platform-agnostic collector type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type Collector = NoopCollector;

/// Capacity of the channel between the OS callback and the runtime.
pub const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// How long `start()` waits for the capture thread to install its hook.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// A source of raw key transitions.
///
/// Implementations own their event channel for their whole lifetime, so a
/// receiver obtained once keeps working across `stop()`/`start()` cycles.
pub trait KeySource: Send {
    /// Begin capturing. Fails when the underlying OS capability is unavailable.
    fn start(&mut self) -> Result<(), CollectorError>;

    /// Stop capturing. Safe to call when not running.
    fn stop(&mut self);

    /// Check if capture is currently running.
    fn is_running(&self) -> bool;

    /// Receiver for captured events.
    fn receiver(&self) -> &Receiver<KeyboardEvent>;

    /// Guidance shown to the user when capture is not working.
    fn platform_hint(&self) -> &'static str {
        platform_hint()
    }
}
