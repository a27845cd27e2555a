//! Error types shared across the engine.
//!
//! None of these are fatal: validation errors are rejected locally and
//! persistence errors are logged and retried.

use thiserror::Error;

/// Rejected user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name must not be empty")]
    EmptyName,
}

/// Storage failures. Storage is advisory, so callers log these and move on.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Parse error: {0}")]
    Deserialize(String),
}
