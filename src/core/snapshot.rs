//! Versioned stats snapshot pushed to the presentation layer.
//!
//! One canonical structure carries every field a front end may need, so
//! renderers never have to guess which counters exist.

use crate::core::evolution::{Appearance, EvolutionStage};
use crate::core::progression::ProgressionEngine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A fully settled view of the engine at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub schema_version: u32,
    /// Keystrokes since the last level-up
    pub session_keystrokes: u64,
    /// Lifetime keystrokes since the last reset
    pub cumulative_keystrokes: u64,
    pub level: u32,
    pub level_threshold: u64,
    /// Fraction of the current level completed (0.0 to 1.0)
    pub level_progress: f64,
    /// Keystrokes in the trailing minute
    pub rate: u64,
    pub name: String,
    pub evolution: EvolutionStage,
    pub on_fire: bool,
    pub face: String,
    /// Whether manual input is being offered as a fallback
    pub degraded: bool,
    /// Identifies the running engine process
    pub instance_id: String,
}

/// Builds snapshots stamped with this process's instance id.
pub struct SnapshotBuilder {
    instance_id: Uuid,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> &Uuid {
        &self.instance_id
    }

    /// Capture the engine's state. Level-ups are applied synchronously on
    /// every keystroke, so the engine is always settled here.
    pub fn build(&self, engine: &ProgressionEngine, rate: u64, degraded: bool) -> StatsSnapshot {
        let state = engine.state();
        let appearance = Appearance::new(state.level(), rate);

        StatsSnapshot {
            schema_version: SNAPSHOT_VERSION,
            session_keystrokes: state.session_keystrokes(),
            cumulative_keystrokes: state.cumulative_keystrokes(),
            level: state.level(),
            level_threshold: engine.level_threshold(),
            level_progress: engine.progress(),
            rate,
            name: state.display_name().to_string(),
            evolution: appearance.stage,
            on_fire: appearance.on_fire,
            face: appearance.face.to_string(),
            degraded,
            instance_id: self.instance_id.to_string(),
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_fields() {
        let mut engine = ProgressionEngine::default();
        engine.record_keystrokes(250);
        engine.rename("Pixel").unwrap();

        let builder = SnapshotBuilder::new();
        let snapshot = builder.build(&engine, 120, false);

        assert_eq!(snapshot.schema_version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.session_keystrokes, 150);
        assert_eq!(snapshot.cumulative_keystrokes, 250);
        assert_eq!(snapshot.level, 2);
        assert_eq!(snapshot.level_threshold, 200);
        assert!((snapshot.level_progress - 0.75).abs() < f64::EPSILON);
        assert_eq!(snapshot.rate, 120);
        assert_eq!(snapshot.name, "Pixel");
        assert_eq!(snapshot.evolution, EvolutionStage::Baby);
        assert!(snapshot.on_fire);
        assert_eq!(snapshot.instance_id, builder.instance_id().to_string());
    }

    #[test]
    fn test_snapshot_json_uses_camel_case() {
        let snapshot = SnapshotBuilder::new().build(&ProgressionEngine::default(), 0, true);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["sessionKeystrokes"], 0);
        assert_eq!(json["cumulativeKeystrokes"], 0);
        assert_eq!(json["levelProgress"], 0.0);
        assert_eq!(json["name"], "Unnamed");
        assert_eq!(json["onFire"], false);
        assert_eq!(json["degraded"], true);
    }
}
