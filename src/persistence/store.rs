//! Durable storage for progress.
//!
//! Loading is soft: any IO or parse failure is treated exactly like "no
//! saved progress". Writes are atomic (write to `.tmp`, then rename) so an
//! interrupted save never leaves a file that parses as the wrong state.

use crate::core::{ProgressState, DEFAULT_NAME};
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The current save-file schema version.
pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

/// Storage for one pet's progress.
pub trait ProgressStore: Send {
    /// Read saved progress. `Ok(None)` means nothing has been saved.
    fn try_load(&self) -> Result<Option<ProgressState>, PersistenceError>;

    /// Write progress, replacing any previous save.
    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError>;

    /// Delete saved progress. Deleting nothing is not an error.
    fn clear(&self) -> Result<(), PersistenceError>;

    /// Read saved progress, treating every failure as "not found".
    fn load(&self) -> Option<ProgressState> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Ignoring unreadable saved progress: {e}");
                None
            }
        }
    }
}

/// Save-file format. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PersistedProgress {
    schema_version: u32,
    #[serde(alias = "keystrokeCount", alias = "sessionKeystrokes")]
    session_keystrokes: u64,
    #[serde(alias = "cumulativeKeystrokes")]
    cumulative_keystrokes: u64,
    #[serde(alias = "currentLevel")]
    level: u32,
    name: String,
    saved_at: Option<DateTime<Utc>>,
}

impl Default for PersistedProgress {
    fn default() -> Self {
        Self {
            schema_version: PROGRESS_SCHEMA_VERSION,
            session_keystrokes: 0,
            cumulative_keystrokes: 0,
            level: 1,
            name: DEFAULT_NAME.to_string(),
            saved_at: None,
        }
    }
}

impl From<&ProgressState> for PersistedProgress {
    fn from(state: &ProgressState) -> Self {
        Self {
            schema_version: PROGRESS_SCHEMA_VERSION,
            session_keystrokes: state.session_keystrokes(),
            cumulative_keystrokes: state.cumulative_keystrokes(),
            level: state.level(),
            name: state.display_name().to_string(),
            saved_at: Some(Utc::now()),
        }
    }
}

impl From<PersistedProgress> for ProgressState {
    fn from(saved: PersistedProgress) -> Self {
        ProgressState::new(
            saved.session_keystrokes,
            saved.cumulative_keystrokes,
            saved.level,
            &saved.name,
        )
    }
}

fn encode(state: &ProgressState) -> Result<String, PersistenceError> {
    serde_json::to_string_pretty(&PersistedProgress::from(state))
        .map_err(|e| PersistenceError::Serialize(e.to_string()))
}

fn decode(content: &str) -> Result<ProgressState, PersistenceError> {
    let saved: PersistedProgress =
        serde_json::from_str(content).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;
    Ok(saved.into())
}

/// JSON-file progress storage.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl ProgressStore for JsonFileStore {
    fn try_load(&self) -> Result<Option<ProgressState>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        decode(&content).map(Some)
    }

    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError> {
        let json = encode(state)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path();
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        for path in [self.path.clone(), self.temp_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// In-memory progress storage (for testing).
///
/// Clones share the same slot, so a test can keep one handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    slot: Arc<Mutex<Option<String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail with an IO error.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    /// Store raw content, e.g. to simulate a corrupted file.
    pub fn put_raw(&self, content: &str) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(content.to_string());
        }
    }

    pub fn has_data(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn lock_slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, PersistenceError> {
        self.slot
            .lock()
            .map_err(|_| PersistenceError::Io(std::io::Error::other("store lock poisoned")))
    }
}

impl ProgressStore for InMemoryStore {
    fn try_load(&self) -> Result<Option<ProgressState>, PersistenceError> {
        match self.lock_slot()?.as_deref() {
            Some(content) => decode(content).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError> {
        if self.fail_writes.lock().map(|flag| *flag).unwrap_or(false) {
            return Err(PersistenceError::Io(std::io::Error::other(
                "simulated write failure",
            )));
        }
        let json = encode(state)?;
        *self.lock_slot()? = Some(json);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.lock_slot()? = None;
        Ok(())
    }
}
