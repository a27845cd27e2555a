//! Integration tests driving the runtime through a scripted key source.

use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use keypet::collector::{CollectorError, KeySource, KeyboardEvent};
use keypet::core::{FailureKind, DEFAULT_NAME};
use keypet::persistence::{InMemoryStore, JsonFileStore, ProgressStore};
use keypet::protocol::{Command, Notification};
use keypet::transparency::create_shared_log;
use keypet::{Config, PetRuntime};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared handle for steering a [`ScriptedSource`] from the test body.
#[derive(Clone, Default)]
struct SourceControl {
    /// Outcomes for upcoming `start()` calls; empty means succeed
    fail_next: Arc<Mutex<VecDeque<bool>>>,
    running: Arc<AtomicBool>,
    starts: Arc<AtomicUsize>,
}

impl SourceControl {
    fn fail_starts(&self, count: usize) {
        let mut queue = self.fail_next.lock().unwrap();
        queue.extend(std::iter::repeat(true).take(count));
    }

    fn kill(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

struct ScriptedSource {
    control: SourceControl,
    tx: Sender<KeyboardEvent>,
    rx: Receiver<KeyboardEvent>,
}

impl ScriptedSource {
    fn new() -> (Self, SourceControl) {
        let (tx, rx) = unbounded();
        let control = SourceControl::default();
        let source = Self {
            control: control.clone(),
            tx,
            rx,
        };
        (source, control)
    }
}

impl KeySource for ScriptedSource {
    fn start(&mut self) -> Result<(), CollectorError> {
        self.control.starts.fetch_add(1, Ordering::SeqCst);
        let fail = self.control.fail_next.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(CollectorError::PermissionDenied);
        }
        self.control.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.control.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<KeyboardEvent> {
        &self.rx
    }

    fn platform_hint(&self) -> &'static str {
        "Grant keyboard access in the test harness"
    }
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn test_config(data_path: &Path) -> Config {
    Config {
        data_path: data_path.to_path_buf(),
        ..Config::default()
    }
}

struct Harness {
    runtime: PetRuntime<ScriptedSource>,
    control: SourceControl,
    notifications: Receiver<Notification>,
}

impl Harness {
    fn new(config: Config, store: Box<dyn ProgressStore>) -> Self {
        let (source, control) = ScriptedSource::new();
        let (tx, notifications) = bounded(1024);
        let runtime = PetRuntime::new(config, source, store, tx, create_shared_log());
        Self {
            runtime,
            control,
            notifications,
        }
    }

    fn in_memory(store: &InMemoryStore) -> Self {
        Self::new(test_config(Path::new(".")), Box::new(store.clone()))
    }

    fn drain(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    fn press(&mut self, at: DateTime<Utc>) {
        self.runtime.handle_key_event(KeyboardEvent::press(at));
    }

    fn tap(&mut self, at: DateTime<Utc>) {
        self.runtime.handle_key_event(KeyboardEvent::press(at));
        self.runtime.handle_key_event(KeyboardEvent::release(at));
    }

    fn command(&mut self, command: Command, at: DateTime<Utc>) {
        assert!(self.runtime.handle_command(command, at).is_continue());
    }
}

fn monitor_errors(notifications: &[Notification]) -> Vec<FailureKind> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::KeyboardMonitorError { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

fn recoveries(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| matches!(n, Notification::KeystrokeAfterTimeout))
        .count()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_burst_levels_up_with_carry() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.runtime.start(t(0));

    for _ in 0..250 {
        h.command(Command::Keystroke, t(1));
    }

    let snapshot = h.runtime.snapshot();
    assert_eq!(snapshot.level, 2);
    assert_eq!(snapshot.session_keystrokes, 150);
    assert_eq!(snapshot.cumulative_keystrokes, 250);
    assert_eq!(snapshot.level_threshold, 200);
    assert!((snapshot.level_progress - 0.75).abs() < 1e-9);
    assert_eq!(h.runtime.transparency().stats().manual_keystrokes, 250);
}

#[test]
fn test_held_key_counts_once() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.runtime.start(t(0));

    // Auto-repeat: three presses, one release, then a fresh press
    h.press(t(1));
    h.press(t(1));
    h.press(t(1));
    h.runtime.handle_key_event(KeyboardEvent::release(t(2)));
    h.press(t(3));

    assert_eq!(h.runtime.engine().state().cumulative_keystrokes(), 2);
    let stats = h.runtime.transparency().stats();
    assert_eq!(stats.captured_keystrokes, 2);
    assert_eq!(stats.debounced_presses, 2);
}

#[test]
fn test_rate_covers_trailing_minute() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.runtime.start(t(0));

    h.tap(t(0));
    h.tap(t(59));

    h.runtime.tick(t(60));
    assert_eq!(h.runtime.snapshot().rate, 2);
    h.runtime.tick(t(61));
    assert_eq!(h.runtime.snapshot().rate, 1);
    h.runtime.tick(t(120));
    assert_eq!(h.runtime.snapshot().rate, 0);
}

#[test]
fn test_silent_capture_notifies_once_and_recovers_once() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.runtime.start(t(0));

    h.runtime.tick(t(30));
    assert!(h.drain().is_empty());

    h.runtime.tick(t(60));
    let first = h.drain();
    assert_eq!(monitor_errors(&first), vec![FailureKind::CaptureSilent]);
    assert!(h.runtime.snapshot().degraded);

    // The automatic retry reinitializes capture without a repeat notice
    for secs in 61..=400 {
        h.runtime.tick(t(secs));
    }
    assert!(h.control.starts() >= 2);
    assert!(monitor_errors(&h.drain()).is_empty());
    assert!(h.runtime.watchdog().is_degraded());

    // Manual input while degraded still counts
    h.command(Command::Keystroke, t(401));
    assert_eq!(h.runtime.engine().state().cumulative_keystrokes(), 1);

    h.tap(t(402));
    h.tap(t(403));
    let after = h.drain();
    assert_eq!(recoveries(&after), 1);
    assert!(!h.runtime.snapshot().degraded);
    assert_eq!(h.runtime.engine().state().cumulative_keystrokes(), 3);
}

#[test]
fn test_start_failure_then_manual_retry() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.control.fail_starts(1);
    h.runtime.start(t(0));

    let notices = h.drain();
    assert_eq!(monitor_errors(&notices), vec![FailureKind::CaptureUnavailable]);
    match &notices[0] {
        Notification::KeyboardMonitorError { platform_hint, .. } => {
            assert_eq!(platform_hint, "Grant keyboard access in the test harness");
        }
        other => panic!("unexpected notification {other:?}"),
    }
    assert!(h.runtime.snapshot().degraded);

    h.command(Command::RetryKeyboardMonitoring, t(10));
    h.runtime.tick(t(10));
    assert_eq!(h.control.starts(), 1);

    h.runtime.tick(t(11));
    assert_eq!(h.control.starts(), 2);
    assert!(h.drain().is_empty());
    assert_eq!(h.runtime.transparency().stats().retry_attempts, 1);

    h.tap(t(12));
    assert_eq!(recoveries(&h.drain()), 1);
    assert!(!h.runtime.watchdog().is_degraded());
    assert_eq!(h.runtime.watchdog().pending_retry_at(), None);
}

#[test]
fn test_failed_retry_notifies_again() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.control.fail_starts(2);
    h.runtime.start(t(0));
    assert_eq!(monitor_errors(&h.drain()).len(), 1);

    h.command(Command::RetryKeyboardMonitoring, t(5));
    h.runtime.tick(t(6));
    assert_eq!(
        monitor_errors(&h.drain()),
        vec![FailureKind::CaptureUnavailable]
    );
    assert_eq!(h.runtime.transparency().stats().monitor_errors, 2);
}

#[test]
fn test_capture_stopping_on_its_own_degrades() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    h.runtime.start(t(0));
    h.tap(t(1));

    h.control.kill();
    h.runtime.tick(t(2));
    assert_eq!(
        monitor_errors(&h.drain()),
        vec![FailureKind::CaptureUnavailable]
    );

    // Only reported once while it stays down
    h.runtime.tick(t(3));
    assert!(monitor_errors(&h.drain()).is_empty());
}

#[test]
fn test_rename_validation() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);

    h.command(
        Command::UpdateName {
            name: "   ".to_string(),
        },
        t(0),
    );
    assert_eq!(h.runtime.engine().state().display_name(), DEFAULT_NAME);
    assert!(!store.has_data());

    h.command(
        Command::UpdateName {
            name: "  Rex ".to_string(),
        },
        t(1),
    );
    assert_eq!(h.runtime.snapshot().name, "Rex");

    // Rename is saved immediately
    assert!(wait_until(|| store.has_data()));
    assert_eq!(store.load().map(|s| s.display_name().to_string()), Some("Rex".to_string()));
}

#[test]
fn test_progress_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.progress_path();

    {
        let mut h = Harness::new(config.clone(), Box::new(JsonFileStore::new(&path)));
        for _ in 0..120 {
            h.command(Command::Keystroke, t(0));
        }
        h.command(
            Command::UpdateName {
                name: "Biscuit".to_string(),
            },
            t(0),
        );
        h.runtime.shutdown();
        assert!(h.runtime.is_shut_down());
        // Second shutdown is a no-op
        h.runtime.shutdown();
    }
    assert!(path.exists());

    let h = Harness::new(config, Box::new(JsonFileStore::new(&path)));
    let state = h.runtime.engine().state();
    assert_eq!(state.level(), 2);
    assert_eq!(state.session_keystrokes(), 20);
    assert_eq!(state.cumulative_keystrokes(), 120);
    assert_eq!(state.display_name(), "Biscuit");
}

#[test]
fn test_reset_deletes_saved_progress() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = config.progress_path();

    {
        let mut h = Harness::new(config.clone(), Box::new(JsonFileStore::new(&path)));
        for _ in 0..10 {
            h.command(Command::Keystroke, t(0));
        }
        h.tap(t(1));
        h.runtime.flush_if_dirty();
        h.command(Command::ResetData, t(2));

        let snapshot = h.runtime.snapshot();
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.cumulative_keystrokes, 0);
        assert_eq!(snapshot.rate, 0);
        assert_eq!(snapshot.name, DEFAULT_NAME);
        h.runtime.shutdown();
    }
    assert!(!path.exists());

    let h = Harness::new(config, Box::new(JsonFileStore::new(&path)));
    assert_eq!(h.runtime.engine().state().cumulative_keystrokes(), 0);
}

#[test]
fn test_saved_state_is_normalized_on_load() {
    let store = InMemoryStore::new();
    store.put_raw(
        r#"{"sessionKeystrokes":250,"cumulativeKeystrokes":250,"level":1,"name":"Rex"}"#,
    );

    let h = Harness::in_memory(&store);
    let state = h.runtime.engine().state();
    assert_eq!(state.level(), 2);
    assert_eq!(state.session_keystrokes(), 150);
    assert_eq!(state.display_name(), "Rex");
}

#[test]
fn test_corrupt_save_starts_fresh() {
    let store = InMemoryStore::new();
    store.put_raw("{ not json");

    let h = Harness::in_memory(&store);
    assert_eq!(h.runtime.engine().state().cumulative_keystrokes(), 0);
    assert_eq!(h.runtime.engine().state().level(), 1);
}

#[test]
fn test_failed_save_is_retried() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);

    store.set_fail_writes(true);
    h.command(Command::Keystroke, t(0));
    h.runtime.flush_if_dirty();
    let log = h.runtime.transparency().clone();
    assert!(wait_until(|| log.stats().failed_saves == 1));
    assert!(!store.has_data());

    // Nothing changed since, but the failed save is queued again
    store.set_fail_writes(false);
    h.runtime.flush_if_dirty();
    assert!(wait_until(|| store.has_data()));
    assert_eq!(store.load().map(|s| s.cumulative_keystrokes()), Some(1));
}

#[test]
fn test_reset_after_failed_save_leaves_no_file() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);

    store.set_fail_writes(true);
    h.command(Command::Keystroke, t(0));
    h.runtime.flush_if_dirty();
    let log = h.runtime.transparency().clone();
    assert!(wait_until(|| log.stats().failed_saves == 1));

    store.set_fail_writes(false);
    h.command(Command::ResetData, t(1));
    h.runtime.flush_if_dirty();
    h.runtime.shutdown();

    assert!(!store.has_data());
}

#[test]
fn test_run_processes_commands_until_exit() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);

    let (commands, command_rx) = bounded(16);
    for _ in 0..3 {
        commands.send(Command::Keystroke).unwrap();
    }
    commands.send(Command::ExitApp).unwrap();

    h.runtime
        .run(command_rx, Arc::new(AtomicBool::new(true)));

    assert!(h.runtime.is_shut_down());
    assert!(!h.control.running.load(Ordering::SeqCst));
    assert_eq!(store.load().map(|s| s.cumulative_keystrokes()), Some(3));
}

#[test]
fn test_run_stops_when_flag_cleared() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    let (_commands, command_rx) = bounded::<Command>(1);

    let running = Arc::new(AtomicBool::new(true));
    let stopper = running.clone();
    let timer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        stopper.store(false, Ordering::SeqCst);
    });

    h.runtime.run(command_rx, running);
    timer.join().unwrap();

    assert!(h.runtime.is_shut_down());
    let snapshots = h
        .drain()
        .into_iter()
        .filter(|n| matches!(n, Notification::StatsUpdate(_)))
        .count();
    assert!(snapshots >= 1);
}

#[test]
fn test_exit_app_breaks() {
    let store = InMemoryStore::new();
    let mut h = Harness::in_memory(&store);
    assert!(h.runtime.handle_command(Command::ExitApp, t(0)).is_break());
}
