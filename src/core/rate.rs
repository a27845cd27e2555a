//! Sliding one-minute window of keystroke timestamps.
//!
//! Pruning is driven by [`RateWindow::tick`] on a fixed cadence rather than
//! by new events, so the rate decays to zero when typing stops.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Length of the trailing window.
pub const RATE_WINDOW_SECS: i64 = 60;

/// Timestamps of recent keystrokes and the last computed rate.
#[derive(Debug, Clone)]
pub struct RateWindow {
    /// Ordered oldest first
    events: VecDeque<DateTime<Utc>>,
    span: Duration,
    current_rate: u64,
}

impl RateWindow {
    /// Create an empty one-minute window.
    pub fn new() -> Self {
        Self::with_span(Duration::seconds(RATE_WINDOW_SECS))
    }

    /// Create an empty window of a custom length.
    pub fn with_span(span: Duration) -> Self {
        Self {
            events: VecDeque::new(),
            span,
            current_rate: 0,
        }
    }

    /// Append a keystroke timestamp.
    ///
    /// Events are expected in arrival order; a timestamp older than the
    /// current tail is clamped to the tail to keep the sequence sorted.
    pub fn record_event(&mut self, timestamp: DateTime<Utc>) {
        let timestamp = match self.events.back() {
            Some(&last) if timestamp < last => last,
            _ => timestamp,
        };
        self.events.push_back(timestamp);
    }

    /// Drop everything older than `now - span` and recompute the rate.
    ///
    /// An event exactly `span` old is still counted; one tick later it is gone.
    /// Keep `<` here: t=0 and t=59 must give a rate of 2 at t=60, even though
    /// a strict "last 60 seconds" reading would drop the t=0 event.
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        let cutoff = now - self.span;
        while matches!(self.events.front(), Some(&oldest) if oldest < cutoff) {
            self.events.pop_front();
        }
        self.current_rate = self.events.len() as u64;
        self.current_rate
    }

    /// Keystrokes in the window as of the last tick.
    pub fn current_rate(&self) -> u64 {
        self.current_rate
    }

    /// Number of timestamps currently held, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Forget all events.
    pub fn clear(&mut self) {
        self.events.clear();
        self.current_rate = 0;
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_rate_decays_to_zero() {
        let mut window = RateWindow::new();
        for s in 0..5 {
            window.record_event(at(s));
        }
        assert_eq!(window.tick(at(4)), 5);
        assert_eq!(window.tick(at(65)), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_window_boundary() {
        let mut window = RateWindow::new();
        window.record_event(at(0));
        window.record_event(at(59));

        // t=0 is exactly 60s old at t=60 and still counts
        assert_eq!(window.tick(at(60)), 2);
        assert_eq!(window.tick(at(61)), 1);
        assert_eq!(window.tick(at(119)), 1);
        assert_eq!(window.tick(at(120)), 0);
    }

    #[test]
    fn test_rate_only_changes_on_tick() {
        let mut window = RateWindow::new();
        window.record_event(at(0));
        window.record_event(at(1));
        assert_eq!(window.current_rate(), 0);
        assert_eq!(window.len(), 2);

        window.tick(at(2));
        assert_eq!(window.current_rate(), 2);
    }

    #[test]
    fn test_out_of_order_event_is_clamped() {
        let mut window = RateWindow::new();
        window.record_event(at(10));
        window.record_event(at(5));
        assert_eq!(window.tick(at(70)), 2);
        assert_eq!(window.tick(at(71)), 0);
    }

    #[test]
    fn test_clear() {
        let mut window = RateWindow::new();
        window.record_event(at(0));
        window.tick(at(1));
        window.clear();
        assert_eq!(window.current_rate(), 0);
        assert!(window.is_empty());
    }
}
