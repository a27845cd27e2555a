//! Transparency module for keypet.
//!
//! This module provides tools for tracking and exposing what the engine
//! observes, supporting user trust.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
