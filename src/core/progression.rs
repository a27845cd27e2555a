//! Keystroke counters and the leveling curve.
//!
//! Every counted keystroke feeds both the lifetime total and the
//! per-level counter. When the per-level counter reaches the threshold for
//! the current level, the threshold is subtracted and the level advances;
//! this repeats until the counter is below the threshold again, so a single
//! burst can cross several levels at once.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Name used until the user picks one.
pub const DEFAULT_NAME: &str = "Unnamed";

/// Keystrokes required to leave level 1.
pub const DEFAULT_CURVE_BASE: u64 = 100;

/// Leveling curve. The threshold is always re-derived from the level, so a
/// save file written under one curve still converges under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelCurve {
    /// `base * growth^(level - 1)`
    Exponential { base: u64, growth: u64 },
    /// `base * level^2`
    Quadratic { base: u64 },
}

impl Default for LevelCurve {
    fn default() -> Self {
        LevelCurve::Exponential {
            base: DEFAULT_CURVE_BASE,
            growth: 2,
        }
    }
}

impl LevelCurve {
    /// Keystrokes needed to advance from `level` to `level + 1`.
    ///
    /// Saturates at `u64::MAX` instead of overflowing; never returns zero.
    pub fn threshold(&self, level: u32) -> u64 {
        let level = level.max(1);
        let threshold = match *self {
            LevelCurve::Exponential { base, growth } => growth
                .checked_pow(level - 1)
                .and_then(|factor| base.checked_mul(factor))
                .unwrap_or(u64::MAX),
            LevelCurve::Quadratic { base } => {
                let level = u64::from(level);
                base.saturating_mul(level.saturating_mul(level))
            }
        };
        threshold.max(1)
    }

    /// Reject curves that are not strictly increasing.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            LevelCurve::Exponential { base, growth } => {
                if base == 0 {
                    return Err("curve base must be positive".to_string());
                }
                if growth < 2 {
                    return Err("exponential growth must be at least 2".to_string());
                }
            }
            LevelCurve::Quadratic { base } => {
                if base == 0 {
                    return Err("curve base must be positive".to_string());
                }
            }
        }
        Ok(())
    }
}

/// The persisted progress of one pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    session_keystrokes: u64,
    cumulative_keystrokes: u64,
    level: u32,
    display_name: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            session_keystrokes: 0,
            cumulative_keystrokes: 0,
            level: 1,
            display_name: DEFAULT_NAME.to_string(),
        }
    }
}

impl ProgressState {
    /// Build a state from raw values, normalizing out-of-range input.
    ///
    /// Level 0 becomes 1 and a blank name becomes the default. The session
    /// counter may still exceed the threshold; the engine settles that.
    pub fn new(
        session_keystrokes: u64,
        cumulative_keystrokes: u64,
        level: u32,
        display_name: &str,
    ) -> Self {
        let name = display_name.trim();
        Self {
            session_keystrokes,
            cumulative_keystrokes,
            level: level.max(1),
            display_name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name.to_string()
            },
        }
    }

    pub fn session_keystrokes(&self) -> u64 {
        self.session_keystrokes
    }

    pub fn cumulative_keystrokes(&self) -> u64 {
        self.cumulative_keystrokes
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Owns the progress state and keeps its invariants.
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    state: ProgressState,
    curve: LevelCurve,
    dirty: bool,
}

impl ProgressionEngine {
    /// Create an engine with fresh progress.
    pub fn new(curve: LevelCurve) -> Self {
        Self {
            state: ProgressState::default(),
            curve,
            dirty: false,
        }
    }

    /// Resume from previously saved progress.
    ///
    /// Level-ups are applied immediately, which matters when the state was
    /// saved under a different curve.
    pub fn from_state(state: ProgressState, curve: LevelCurve) -> Self {
        let mut engine = Self {
            state,
            curve,
            dirty: false,
        };
        if engine.apply_level_ups() > 0 {
            engine.dirty = true;
        }
        engine
    }

    /// Count one keystroke. Returns the number of levels gained.
    pub fn record_keystroke(&mut self) -> u32 {
        self.record_keystrokes(1)
    }

    /// Count a burst of keystrokes at once. Returns the number of levels gained.
    pub fn record_keystrokes(&mut self, count: u64) -> u32 {
        if count == 0 {
            return 0;
        }
        self.state.session_keystrokes = self.state.session_keystrokes.saturating_add(count);
        self.state.cumulative_keystrokes = self.state.cumulative_keystrokes.saturating_add(count);
        self.dirty = true;
        self.apply_level_ups()
    }

    /// Run the leveling pass to a fixpoint.
    ///
    /// Afterwards `session_keystrokes < level_threshold()` always holds.
    pub fn apply_level_ups(&mut self) -> u32 {
        let mut gained = 0;
        loop {
            let threshold = self.curve.threshold(self.state.level);
            if self.state.session_keystrokes < threshold {
                break;
            }
            self.state.session_keystrokes -= threshold;
            self.state.level = self.state.level.saturating_add(1);
            gained += 1;
        }
        if gained > 0 {
            tracing::info!(
                level = self.state.level,
                gained,
                "Level up, next threshold {}",
                self.level_threshold()
            );
        }
        gained
    }

    /// Keystrokes required to leave the current level.
    pub fn level_threshold(&self) -> u64 {
        self.curve.threshold(self.state.level)
    }

    /// Fraction of the current level completed, in `[0, 1)`.
    pub fn progress(&self) -> f64 {
        // Huge counts round to 1.0 once cast to f64
        let ratio = self.state.session_keystrokes as f64 / self.level_threshold() as f64;
        ratio.min(1.0 - f64::EPSILON)
    }

    /// Replace the display name. Leading and trailing whitespace is dropped.
    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name != self.state.display_name {
            self.state.display_name = name.to_string();
            self.dirty = true;
        }
        Ok(())
    }

    /// Restore every field to its initial value.
    ///
    /// Deleting the saved copy is the caller's job.
    pub fn reset(&mut self) {
        self.state = ProgressState::default();
        self.dirty = false;
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn curve(&self) -> LevelCurve {
        self.curve
    }

    /// Whether the state changed since the last [`mark_clean`](Self::mark_clean).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(LevelCurve::default())
    }
}
