//! Character appearance derived from level and typing speed.

use serde::{Deserialize, Serialize};

/// Rate above which the pet is drawn "on fire".
pub const ON_FIRE_RATE: u64 = 100;

/// Growth stage of the pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStage {
    Baby,
    Child,
    Teen,
    Adult,
    Master,
}

impl EvolutionStage {
    /// Stage boundaries are exclusive: level 5 is already a child.
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=4 => EvolutionStage::Baby,
            5..=9 => EvolutionStage::Child,
            10..=14 => EvolutionStage::Teen,
            15..=19 => EvolutionStage::Adult,
            _ => EvolutionStage::Master,
        }
    }

    fn faces(self, on_fire: bool) -> [&'static str; 3] {
        match (self, on_fire) {
            (EvolutionStage::Baby, false) => ["^_^", "^o^", "^v^"],
            (EvolutionStage::Baby, true) => ["🔥_🔥", "🔥o🔥", "🔥v🔥"],
            (EvolutionStage::Child, false) => ["•ᴗ•", "•o•", "•ᴥ•"],
            (EvolutionStage::Child, true) => ["🔥ᴗ🔥", "🔥o🔥", "🔥ᴥ🔥"],
            (EvolutionStage::Teen, false) => ["◕‿◕", "◕o◕", "◕ᴥ◕"],
            (EvolutionStage::Teen, true) => ["🔥‿🔥", "🔥o🔥", "🔥ᴥ🔥"],
            (EvolutionStage::Adult, false) => ["⚆_⚆", "⚆ω⚆", "⚆ᴥ⚆"],
            (EvolutionStage::Adult, true) => ["🔥_🔥", "🔥ω🔥", "🔥ᴥ🔥"],
            (EvolutionStage::Master, false) => ["★_★", "★ω★", "★ᴥ★"],
            (EvolutionStage::Master, true) => ["🔥_🔥", "🔥ω🔥", "🔥ᴥ🔥"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvolutionStage::Baby => "baby",
            EvolutionStage::Child => "child",
            EvolutionStage::Teen => "teen",
            EvolutionStage::Adult => "adult",
            EvolutionStage::Master => "master",
        }
    }
}

impl std::fmt::Display for EvolutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the pet looks like right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    pub stage: EvolutionStage,
    pub on_fire: bool,
    pub face: &'static str,
}

impl Appearance {
    pub fn new(level: u32, rate: u64) -> Self {
        let stage = EvolutionStage::for_level(level);
        let on_fire = rate > ON_FIRE_RATE;
        let faces = stage.faces(on_fire);
        Self {
            stage,
            on_fire,
            face: faces[level as usize % faces.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(EvolutionStage::for_level(1), EvolutionStage::Baby);
        assert_eq!(EvolutionStage::for_level(4), EvolutionStage::Baby);
        assert_eq!(EvolutionStage::for_level(5), EvolutionStage::Child);
        assert_eq!(EvolutionStage::for_level(10), EvolutionStage::Teen);
        assert_eq!(EvolutionStage::for_level(15), EvolutionStage::Adult);
        assert_eq!(EvolutionStage::for_level(19), EvolutionStage::Adult);
        assert_eq!(EvolutionStage::for_level(20), EvolutionStage::Master);
        assert_eq!(EvolutionStage::for_level(u32::MAX), EvolutionStage::Master);
    }

    #[test]
    fn test_on_fire_threshold() {
        assert!(!Appearance::new(1, 100).on_fire);
        assert!(Appearance::new(1, 101).on_fire);
    }

    #[test]
    fn test_face_selection() {
        assert_eq!(Appearance::new(1, 0).face, "^o^");
        assert_eq!(Appearance::new(3, 0).face, "^_^");
        assert_eq!(Appearance::new(20, 150).face, "🔥ᴥ🔥");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(EvolutionStage::Teen.to_string(), "teen");
        assert_eq!(
            serde_json::to_string(&EvolutionStage::Master).unwrap(),
            "\"master\""
        );
    }
}
