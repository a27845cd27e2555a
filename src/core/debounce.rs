//! Key-repeat debounce.

use crate::collector::KeyboardEvent;
use serde::{Deserialize, Serialize};

/// Which presses become counted keystrokes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebouncePolicy {
    /// A press counts only if a release was seen since the last counted press.
    /// OS auto-repeat on a held key is therefore counted once.
    #[default]
    RequireRelease,
    /// Every press counts, including auto-repeat.
    CountEveryPress,
}

impl std::str::FromStr for DebouncePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "require_release" => Ok(DebouncePolicy::RequireRelease),
            "count_every_press" => Ok(DebouncePolicy::CountEveryPress),
            other => Err(format!("unknown debounce policy '{other}'")),
        }
    }
}

/// Turns raw key transitions into counted keystrokes.
#[derive(Debug, Clone)]
pub struct KeyDebouncer {
    policy: DebouncePolicy,
    awaiting_key_up: bool,
}

impl KeyDebouncer {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            awaiting_key_up: false,
        }
    }

    /// Feed one transition. Returns true when it is a counted keystroke.
    pub fn accept(&mut self, event: &KeyboardEvent) -> bool {
        if !event.is_key_down {
            self.awaiting_key_up = false;
            return false;
        }
        match self.policy {
            DebouncePolicy::CountEveryPress => true,
            DebouncePolicy::RequireRelease => {
                if self.awaiting_key_up {
                    false
                } else {
                    self.awaiting_key_up = true;
                    true
                }
            }
        }
    }

    /// Forget any pending press, e.g. after capture was reinitialized and
    /// the matching release may have been lost.
    pub fn reset(&mut self) {
        self.awaiting_key_up = false;
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }

    pub fn awaiting_key_up(&self) -> bool {
        self.awaiting_key_up
    }
}

impl Default for KeyDebouncer {
    fn default() -> Self {
        Self::new(DebouncePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn press() -> KeyboardEvent {
        KeyboardEvent::press(Utc::now())
    }

    fn release() -> KeyboardEvent {
        KeyboardEvent::release(Utc::now())
    }

    #[test]
    fn test_require_release_ignores_repeat() {
        let mut debouncer = KeyDebouncer::new(DebouncePolicy::RequireRelease);
        assert!(debouncer.accept(&press()));
        assert!(!debouncer.accept(&press()));
        assert!(!debouncer.accept(&press()));
        assert!(!debouncer.accept(&release()));
        assert!(debouncer.accept(&press()));
    }

    #[test]
    fn test_count_every_press() {
        let mut debouncer = KeyDebouncer::new(DebouncePolicy::CountEveryPress);
        assert!(debouncer.accept(&press()));
        assert!(debouncer.accept(&press()));
        assert!(!debouncer.accept(&release()));
    }

    #[test]
    fn test_reset_clears_pending_press() {
        let mut debouncer = KeyDebouncer::new(DebouncePolicy::RequireRelease);
        debouncer.accept(&press());
        assert!(debouncer.awaiting_key_up());
        debouncer.reset();
        assert!(debouncer.accept(&press()));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "require-release".parse::<DebouncePolicy>(),
            Ok(DebouncePolicy::RequireRelease)
        );
        assert_eq!(
            "count_every_press".parse::<DebouncePolicy>(),
            Ok(DebouncePolicy::CountEveryPress)
        );
        assert!("sometimes".parse::<DebouncePolicy>().is_err());
    }
}
