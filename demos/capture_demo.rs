//! Demonstration of keypet key capture feeding the progression engine.
//!
//! This example shows how to:
//! 1. Check for keyboard capture permission
//! 2. Start the platform collector
//! 3. Debounce raw transitions into keystrokes
//! 4. Level up and track typing speed
//!
//! Run with: cargo run --example capture_demo
//!
//! Note: on macOS this requires Input Monitoring permission.
//! Nothing is saved; progress starts fresh every run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use keypet::{
    collector::{check_permission, platform_hint, Collector, KeySource},
    core::{Appearance, KeyDebouncer, LevelCurve, ProgressionEngine, RateWindow},
    transparency::TransparencyLog,
    PRIVACY_DECLARATION,
};

fn main() {
    println!("keypet - Capture Demo");
    println!("=====================");
    println!();

    println!("{PRIVACY_DECLARATION}");
    println!();

    print!("Checking keyboard capture permission... ");
    if check_permission() {
        println!("OK ✓");
    } else {
        println!("FAILED ✗");
        println!();
        println!("{}", platform_hint());
        return;
    }
    println!();

    let mut collector = Collector::new();
    let mut debouncer = KeyDebouncer::default();
    // A short curve so levels come quickly while trying it out
    let mut engine = ProgressionEngine::new(LevelCurve::Exponential { base: 10, growth: 2 });
    let mut rate = RateWindow::new();
    let transparency_log = TransparencyLog::new();

    println!("Starting capture for 30 seconds...");
    println!("Start typing!");
    println!();

    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start = std::time::Instant::now();
    let receiver = collector.receiver().clone();

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(30) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if !debouncer.accept(&event) {
                    if event.is_key_down {
                        transparency_log.record_debounced_press();
                    }
                    continue;
                }
                transparency_log.record_captured_keystroke();
                rate.record_event(event.timestamp);

                let gained = engine.record_keystroke();
                let state = engine.state();
                if gained > 0 {
                    let look = Appearance::new(state.level(), rate.current_rate());
                    println!(
                        "  *** Level {}! {} is now a {} {}",
                        state.level(),
                        state.display_name(),
                        look.stage,
                        look.face
                    );
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        let elapsed = start.elapsed().as_secs();
        if rate.tick(Utc::now()) > 0 && elapsed > 0 && start.elapsed().subsec_millis() < 100 {
            println!(
                "  [{elapsed}/30s] {} keys/min, {:.0}% to next level",
                rate.current_rate(),
                engine.progress() * 100.0
            );
        }
    }

    println!();
    println!("Stopping capture...");
    collector.stop();

    let state = engine.state();
    println!();
    println!(
        "Reached level {} with {} keystrokes",
        state.level(),
        state.cumulative_keystrokes()
    );
    println!();
    println!("{}", transparency_log.summary());
    println!();
    println!("Demo complete!");
}
