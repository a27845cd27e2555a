//! Progress persistence.
//!
//! Persistence is best-effort: loads fail softly, saves are retried on the
//! next scheduled tick, and all writes happen on a background thread.

pub mod store;
pub mod worker;

pub use store::{InMemoryStore, JsonFileStore, ProgressStore, PROGRESS_SCHEMA_VERSION};
pub use worker::PersistenceWorker;
