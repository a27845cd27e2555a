//! keypet - a virtual pet that levels up as you type.
//!
//! This library holds the progression engine behind the pet: it counts
//! keystrokes observed system-wide, converts them into levels along a
//! growing curve, tracks typing speed over the last minute, and persists
//! progress across restarts. A presentation layer talks to it over a
//! JSON-lines protocol (see [`protocol`]).
//!
//! # Privacy Guarantees
//!
//! - **No key content**: only the fact that a key went down or up is observed
//! - **No raw storage**: timestamps live in memory for at most one minute
//! - **Transparency**: every counted and dropped event is tallied
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           keypet                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Collector  │──▶│  Debounce   │──▶│ Progression │         │
//! │  │ (OS hooks)  │   │             │   │   + Rate    │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                                   │                │
//! │         ▼                                   ▼                │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Watchdog   │   │ Persistence │◀──│  Snapshot   │──▶ UI   │
//! │  │  (retries)  │   │  (worker)   │   │             │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use crossbeam_channel::bounded;
//! use keypet::{collector, transparency, Config, JsonFileStore, PetRuntime};
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let store = JsonFileStore::new(config.progress_path());
//! let (notify_tx, _notify_rx) = bounded(1024);
//! let (_command_tx, command_rx) = bounded(64);
//!
//! let mut runtime = PetRuntime::new(
//!     config,
//!     collector::Collector::new(),
//!     Box::new(store),
//!     notify_tx,
//!     transparency::create_shared_log(),
//! );
//! runtime.run(command_rx, Arc::new(AtomicBool::new(true)));
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod runtime;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorError, KeySource, KeyboardEvent};
pub use config::{BackoffConfig, Config, ConfigError};
pub use core::{
    DebouncePolicy, EvolutionStage, LevelCurve, ProgressState, ProgressionEngine, RateWindow,
    StatsSnapshot, Watchdog,
};
pub use error::{PersistenceError, ValidationError};
pub use persistence::{InMemoryStore, JsonFileStore, PersistenceWorker, ProgressStore};
pub use protocol::{Command, Notification};
pub use runtime::PetRuntime;
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                  KEYPET - PRIVACY DECLARATION                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  keypet watches your keyboard to feed your pet.                  ║
║                                                                  ║
║  ✓ WHAT WE OBSERVE:                                              ║
║    • That a key went down or came back up                        ║
║    • When it happened (kept for one minute, for typing speed)    ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • What applications you use                                   ║
║    • Any screen content                                          ║
║                                                                  ║
║  Only totals, your level and your pet's name are saved, and      ║
║  only on this computer.                                          ║
║                                                                  ║
║  You can view your pet's progress anytime with:                  ║
║    keypet status                                                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER CAPTURE"));
        assert!(PRIVACY_DECLARATION.contains("keys you press"));
    }
}
