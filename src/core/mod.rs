//! Core functionality for keypet.
//!
//! This module contains:
//! - The progression engine (counters, leveling curve, overflow carry)
//! - The rate monitor (sliding one-minute window)
//! - The capture watchdog and key-repeat debounce
//! - Appearance and snapshot derivation for the presentation layer

pub mod debounce;
pub mod evolution;
pub mod progression;
pub mod rate;
pub mod snapshot;
pub mod watchdog;

// Re-export commonly used types
pub use debounce::{DebouncePolicy, KeyDebouncer};
pub use evolution::{Appearance, EvolutionStage, ON_FIRE_RATE};
pub use progression::{LevelCurve, ProgressState, ProgressionEngine, DEFAULT_NAME};
pub use rate::{RateWindow, RATE_WINDOW_SECS};
pub use snapshot::{SnapshotBuilder, StatsSnapshot, SNAPSHOT_VERSION};
pub use watchdog::{
    FailureKind, MonitorError, RetryBackoff, WatchState, Watchdog, WatchdogConfig,
    WatchdogSignal,
};
