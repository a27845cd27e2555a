//! Windows key capture using a low-level keyboard hook.
//!
//! This module observes key transitions system-wide using the Windows Hook
//! API (SetWindowsHookEx). Key codes are never read.

use crate::collector::types::{CollectorError, KeyboardEvent};
use crate::collector::{KeySource, EVENT_CHANNEL_CAPACITY, STARTUP_TIMEOUT};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

/// The Windows key collector using a low-level keyboard hook.
pub struct WindowsCollector {
    sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
    running: Arc<AtomicBool>,
    hook_thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    /// Create a new Windows collector.
    pub fn new() -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            hook_thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }
}

impl Default for WindowsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for WindowsCollector {
    /// Start capturing events in a background thread.
    ///
    /// Blocks until the hook is installed (or fails).
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let thread_id = self.hook_thread_id.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, running.clone(), thread_id, ready_tx) {
                tracing::warn!("Hook loop error: {e}");
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
                Err(CollectorError::HookInstallationFailed)
            }
        }
    }

    /// Stop capturing events.
    ///
    /// GetMessageW blocks indefinitely, so the hook thread is woken with WM_QUIT.
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let thread_id = self.hook_thread_id.swap(0, Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
        if let Some(handle) = self.thread_handle.take() {
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

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

// Low-level hook callbacks run on the installing thread.
thread_local! {
    static EVENT_SENDER: std::cell::RefCell<Option<Sender<KeyboardEvent>>> = const { std::cell::RefCell::new(None) };
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let message = w_param.0 as u32;

        // Held keys repeat WM_KEYDOWN; the debouncer downstream decides what counts
        if matches!(message, WM_KEYDOWN | WM_KEYUP | WM_SYSKEYDOWN | WM_SYSKEYUP) {
            let is_key_down = matches!(message, WM_KEYDOWN | WM_SYSKEYDOWN);
            EVENT_SENDER.with(|sender| {
                if let Some(ref s) = *sender.borrow() {
                    let _ = s.try_send(KeyboardEvent::new(is_key_down));
                }
            });
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Run the Windows hook message loop.
fn run_hook_loop(
    sender: Sender<KeyboardEvent>,
    running: Arc<AtomicBool>,
    thread_id: Arc<AtomicU32>,
    ready: Sender<Result<(), CollectorError>>,
) -> Result<(), CollectorError> {
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });

    unsafe {
        let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => hook,
            Err(_) => {
                let _ = ready.send(Err(CollectorError::HookInstallationFailed));
                return Err(CollectorError::HookInstallationFailed);
            }
        };

        thread_id.store(GetCurrentThreadId(), Ordering::SeqCst);
        let _ = ready.send(Ok(()));

        let mut msg = MSG::default();
        while running.load(Ordering::SeqCst) {
            // 0 is WM_QUIT, negative is an error; both end the loop
            if GetMessageW(&mut msg, HWND::default(), 0, 0).0 <= 0 {
                break;
            }
        }

        let _ = UnhookWindowsHookEx(hook);
    }

    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });

    Ok(())
}

/// Check whether a low-level keyboard hook can be installed.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

/// Guidance shown alongside a capture error.
pub fn platform_hint() -> &'static str {
    "Low-level keyboard hooks may be blocked by security software; try running with standard user privileges and retry"
}
