//! The single-owner event loop.
//!
//! All state mutation happens on one thread, driven by four sources:
//!
//! ```text
//!  capture thread ──(KeyboardEvent)──┐
//!  presentation   ──(Command)────────┼──▶ PetRuntime ──(Notification)──▶ presentation
//!  tickers (10 Hz / 1 Hz / save) ────┘        │
//!                                             └──(Job)──▶ persistence worker
//! ```
//!
//! Handlers take the current time as an argument so the loop can be driven
//! deterministically in tests.

use crate::collector::{KeySource, KeyboardEvent};
use crate::config::Config;
use crate::core::{
    KeyDebouncer, ProgressionEngine, RateWindow, SnapshotBuilder, StatsSnapshot, Watchdog,
    WatchdogConfig, WatchdogSignal,
};
use crate::persistence::{PersistenceWorker, ProgressStore};
use crate::protocol::{Command, Notification};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use crossbeam_channel::{never, select, tick, Receiver, Sender, TrySendError};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns the engine, its monitors, the capture source and the save queue.
pub struct PetRuntime<S: KeySource> {
    config: Config,
    engine: ProgressionEngine,
    rate: RateWindow,
    watchdog: Watchdog,
    debouncer: KeyDebouncer,
    source: S,
    /// Whether the source started and should still be running
    capture_expected: bool,
    persistence: PersistenceWorker,
    snapshots: SnapshotBuilder,
    log: SharedTransparencyLog,
    notifications: Sender<Notification>,
    shut_down: bool,
}

impl<S: KeySource> PetRuntime<S> {
    /// Build a runtime, resuming saved progress from `store` when present.
    pub fn new(
        config: Config,
        source: S,
        store: Box<dyn ProgressStore>,
        notifications: Sender<Notification>,
        log: SharedTransparencyLog,
    ) -> Self {
        let engine = match store.load() {
            Some(state) => {
                tracing::info!(
                    level = state.level(),
                    cumulative = state.cumulative_keystrokes(),
                    "Resuming saved progress for {}",
                    state.display_name()
                );
                ProgressionEngine::from_state(state, config.curve)
            }
            None => {
                tracing::info!("No saved progress, starting fresh");
                ProgressionEngine::new(config.curve)
            }
        };

        let watchdog = Watchdog::new(WatchdogConfig {
            silence_timeout: config.silence_timeout,
            auto_retry: config.auto_retry,
            backoff: config.retry_backoff.clone(),
            platform_hint: source.platform_hint().to_string(),
        });

        Self {
            engine,
            rate: RateWindow::new(),
            watchdog,
            debouncer: KeyDebouncer::new(config.debounce),
            source,
            capture_expected: false,
            persistence: PersistenceWorker::spawn(store, log.clone()),
            snapshots: SnapshotBuilder::new(),
            log,
            notifications,
            shut_down: false,
            config,
        }
    }

    /// Start key capture and arm the watchdog.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.start_capture(now);
    }

    fn start_capture(&mut self, now: DateTime<Utc>) {
        match self.source.start() {
            Ok(()) => {
                tracing::info!("Keyboard monitoring started");
                self.capture_expected = true;
                self.watchdog.capture_started(now);
            }
            Err(e) => {
                tracing::warn!("Keyboard monitoring failed to start: {e}");
                self.capture_expected = false;
                let signal = self.watchdog.capture_failed(now, &e.to_string());
                self.apply_signal(signal, now);
            }
        }
    }

    fn retry_capture(&mut self, now: DateTime<Utc>) {
        tracing::info!("Retrying keyboard monitoring");
        self.log.record_retry();
        self.source.stop();
        self.debouncer.reset();
        self.start_capture(now);
    }

    /// Handle one raw transition from the capture adapter.
    pub fn handle_key_event(&mut self, event: KeyboardEvent) {
        let now = event.timestamp;
        if let Some(signal) = self.watchdog.observe_event(now) {
            self.apply_signal(signal, now);
        }

        if self.debouncer.accept(&event) {
            self.log.record_captured_keystroke();
            self.count_keystroke(now);
        } else if event.is_key_down {
            self.log.record_debounced_press();
        }
    }

    fn count_keystroke(&mut self, now: DateTime<Utc>) {
        self.engine.record_keystroke();
        self.rate.record_event(now);
    }

    /// Handle a command from the presentation layer.
    ///
    /// Returns `Break` when the process should exit.
    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) -> ControlFlow<()> {
        match command {
            Command::Keystroke => {
                self.log.record_manual_keystroke();
                self.count_keystroke(now);
            }
            Command::UpdateName { name } => match self.engine.rename(&name) {
                Ok(()) => {
                    tracing::info!("Renamed to {}", self.engine.state().display_name());
                    self.save_now();
                }
                Err(e) => tracing::debug!("Ignoring rename: {e}"),
            },
            Command::ResetData => {
                tracing::info!("Resetting all progress");
                self.engine.reset();
                self.rate.clear();
                self.persistence.clear();
                // An earlier failed save must not resurrect the deleted file
                self.persistence.take_save_failed();
            }
            Command::RetryKeyboardMonitoring => {
                self.watchdog
                    .request_retry(now, self.config.manual_retry_delay);
            }
            Command::ExitApp => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Fixed-cadence housekeeping: prune the rate window, check capture
    /// health and run any due retry.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.rate.tick(now);

        if self.capture_expected && !self.source.is_running() {
            self.capture_expected = false;
            let signal = self
                .watchdog
                .capture_failed(now, "capture stopped unexpectedly");
            self.apply_signal(signal, now);
        }

        for signal in self.watchdog.poll(now) {
            self.apply_signal(signal, now);
        }
    }

    fn apply_signal(&mut self, signal: WatchdogSignal, now: DateTime<Utc>) {
        match signal {
            WatchdogSignal::Degraded(error) => {
                self.log.record_monitor_error();
                self.notify(error.into());
            }
            WatchdogSignal::Recovered => {
                self.log.record_recovery();
                self.notify(Notification::KeystrokeAfterTimeout);
            }
            WatchdogSignal::RetryDue => self.retry_capture(now),
        }
    }

    /// Queue a save if anything changed or the last save failed.
    pub fn flush_if_dirty(&mut self) {
        if self.engine.is_dirty() || self.persistence.take_save_failed() {
            self.save_now();
        }
    }

    fn save_now(&mut self) {
        self.persistence.save(self.engine.state().clone());
        self.engine.mark_clean();
    }

    /// The current settled state.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshots.build(
            &self.engine,
            self.rate.current_rate(),
            self.watchdog.is_degraded(),
        )
    }

    /// Push a snapshot to the presentation layer.
    pub fn emit_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.notify(Notification::StatsUpdate(snapshot));
    }

    fn notify(&self, notification: Notification) {
        match self.notifications.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::debug!("Presentation layer lagging, dropped update"),
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("Presentation layer gone, dropped update")
            }
        }
    }

    /// Run until `exit-app`, Ctrl+C (via `running`) or capture channel loss.
    pub fn run(&mut self, commands: Receiver<Command>, running: Arc<AtomicBool>) {
        self.start(Utc::now());

        let keys = self.source.receiver().clone();
        let snapshot_tick = tick(self.config.snapshot_interval);
        let rate_tick = tick(self.config.rate_tick_interval);
        let save_tick = tick(self.config.save_interval);
        let closed = never();
        let mut commands_open = true;

        while running.load(Ordering::SeqCst) {
            let command_rx = if commands_open { &commands } else { &closed };
            select! {
                recv(keys) -> msg => match msg {
                    Ok(event) => self.handle_key_event(event),
                    Err(_) => {
                        tracing::error!("Key capture disconnected unexpectedly");
                        break;
                    }
                },
                recv(command_rx) -> msg => match msg {
                    Ok(command) => {
                        if self.handle_command(command, Utc::now()).is_break() {
                            break;
                        }
                    }
                    Err(_) => {
                        tracing::info!("Command input closed");
                        commands_open = false;
                    }
                },
                recv(snapshot_tick) -> _ => self.emit_snapshot(),
                recv(rate_tick) -> _ => self.tick(Utc::now()),
                recv(save_tick) -> _ => self.flush_if_dirty(),
            }
        }

        self.shutdown();
    }

    /// Stop capture and make a final save bounded by the configured deadline.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.source.stop();
        self.capture_expected = false;
        self.flush_if_dirty();
        if self.persistence.shutdown(self.config.shutdown_save_deadline) {
            tracing::info!("Progress saved");
        }
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn rate(&self) -> &RateWindow {
        &self.rate
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.log
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl<S: KeySource> Drop for PetRuntime<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
