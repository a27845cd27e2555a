//! macOS key capture using a CGEvent tap.
//!
//! This module observes key transitions at the session level using
//! macOS's Core Graphics event tap API. It requires Input Monitoring permission.

use crate::collector::types::{CollectorError, KeyboardEvent};
use crate::collector::{KeySource, EVENT_CHANNEL_CAPACITY, STARTUP_TIMEOUT};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, CallbackResult,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The macOS key collector using a CGEvent tap.
pub struct MacOSCollector {
    sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    /// Create a new macOS collector.
    pub fn new() -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl Default for MacOSCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for MacOSCollector {
    /// Start capturing events in a background thread.
    ///
    /// Blocks until the tap is installed (or fails), so a missing
    /// Input Monitoring permission is reported here rather than silently.
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone(), ready_tx) {
                tracing::warn!("Event tap loop error: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });
        self.thread_handle = Some(handle);

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.stop();
                Err(CollectorError::StartupTimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.stop();
                Err(CollectorError::TapCreationFailed)
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes every 100ms and exits once running is false
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<KeyboardEvent> {
        &self.receiver
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the Core Graphics event loop.
fn run_event_loop(
    sender: Sender<KeyboardEvent>,
    running: Arc<AtomicBool>,
    ready: Sender<Result<(), CollectorError>>,
) -> Result<(), CollectorError> {
    let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, _event: &CGEvent| {
        if let Some(event) = process_cg_event(event_type) {
            // Don't block the OS callback if the channel is full - drop the event
            let _ = sender.try_send(event);
        }
        // We're passive observers
        CallbackResult::Keep
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp],
        callback,
    ) {
        Ok(tap) => tap,
        Err(_) => {
            let _ = ready.send(Err(CollectorError::PermissionDenied));
            return Err(CollectorError::TapCreationFailed);
        }
    };

    let source = match tap.mach_port().create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            let _ = ready.send(Err(CollectorError::RunLoopSourceFailed));
            return Err(CollectorError::RunLoopSourceFailed);
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    // The tap is disabled when dropped
    Ok(())
}

/// Map a CGEvent type to a key transition.
///
/// Privacy: key codes are never read. Modifier-only changes (FlagsChanged)
/// carry no up/down direction and are not reported.
fn process_cg_event(event_type: CGEventType) -> Option<KeyboardEvent> {
    match event_type {
        CGEventType::KeyDown => Some(KeyboardEvent::new(true)),
        CGEventType::KeyUp => Some(KeyboardEvent::new(false)),
        _ => None,
    }
}

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query for this; creating a passive tap fails when
/// the permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}

/// Guidance shown alongside a capture error.
pub fn platform_hint() -> &'static str {
    "Grant Input Monitoring in System Settings > Privacy & Security, then retry"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = MacOSCollector::new();
        assert!(!collector.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut collector = MacOSCollector::new();
        collector.stop();
        collector.stop();
        assert!(!collector.is_running());
    }
}
