//! Fallback collector for platforms without a supported global key hook.
//!
//! This exists so the crate (and binary) can compile on targets without
//! CoreGraphics or the Windows hook API. Starting it always fails, which
//! drops the runtime straight into degraded mode with manual input.

use crate::collector::types::{CollectorError, KeyboardEvent};
use crate::collector::{KeySource, EVENT_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};

/// A collector that never captures anything.
pub struct NoopCollector {
    _sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
}

impl NoopCollector {
    /// Create a new noop collector.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            _sender: sender,
            receiver,
        }
    }
}

impl Default for NoopCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for NoopCollector {
    fn start(&mut self) -> Result<(), CollectorError> {
        Err(CollectorError::Unsupported)
    }

    fn stop(&mut self) {}

    fn is_running(&self) -> bool {
        false
    }

    fn receiver(&self) -> &Receiver<KeyboardEvent> {
        &self.receiver
    }
}

/// There is no permission gate here, only missing support.
pub fn check_permission() -> bool {
    false
}

/// Guidance shown alongside a capture error.
pub fn platform_hint() -> &'static str {
    "Global key capture is not available on this platform; use manual input"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_unsupported() {
        let mut collector = NoopCollector::new();
        assert!(matches!(collector.start(), Err(CollectorError::Unsupported)));
        assert!(!collector.is_running());
        collector.stop();
        assert!(collector.receiver().try_recv().is_err());
    }
}
