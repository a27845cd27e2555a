//! keypet CLI
//!
//! Runs the progression engine for a typing pet and manages its saved
//! progress.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, Receiver, Sender};
use keypet::{
    collector::{check_permission, platform_hint, Collector},
    core::{Appearance, DebouncePolicy, ProgressionEngine},
    persistence::{JsonFileStore, ProgressStore},
    protocol::{Command, Notification},
    transparency::create_shared_log,
    Config, PetRuntime, PRIVACY_DECLARATION, VERSION,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Pending notifications before the runtime starts dropping updates
const NOTIFICATION_BUFFER: usize = 1024;
const COMMAND_BUFFER: usize = 256;

#[derive(Parser)]
#[command(name = "keypet")]
#[command(version = VERSION)]
#[command(about = "A virtual pet that levels up as you type", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine, speaking JSON lines on stdin/stdout
    Start {
        /// Which presses count (require-release or count-every-press)
        #[arg(long)]
        debounce: Option<DebouncePolicy>,

        /// Directory holding saved progress
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show saved progress and capture permission
    Status,

    /// Rename the pet
    Rename {
        /// New name (surrounding whitespace is trimmed)
        name: String,
    },

    /// Delete all saved progress
    Reset,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keypet=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { debounce, data_dir } => cmd_start(debounce, data_dir),
        Commands::Status => cmd_status(),
        Commands::Rename { name } => cmd_rename(&name),
        Commands::Reset => cmd_reset(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| {
        format!(
            "could not load configuration from {}",
            Config::config_path().display()
        )
    })
}

fn cmd_start(debounce: Option<DebouncePolicy>, data_dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(policy) = debounce {
        config.debounce = policy;
    }
    if let Some(dir) = data_dir {
        config.data_path = dir;
    }

    tracing::info!("keypet v{VERSION}");
    tracing::info!("Saving progress to {}", config.progress_path().display());
    if !check_permission() {
        tracing::warn!("Keyboard capture is not permitted yet. {}", platform_hint());
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let (command_tx, command_rx) = bounded(COMMAND_BUFFER);
    let (notify_tx, notify_rx) = bounded(NOTIFICATION_BUFFER);
    spawn_command_reader(command_tx);
    let writer = spawn_notification_writer(notify_rx);

    let log = create_shared_log();
    let store = JsonFileStore::new(config.progress_path());
    let mut runtime = PetRuntime::new(
        config,
        Collector::new(),
        Box::new(store),
        notify_tx,
        log.clone(),
    );
    runtime.run(command_rx, running);

    // Dropping the runtime releases the notification sender, ending the writer
    drop(runtime);
    if writer.join().is_err() {
        tracing::warn!("Notification writer panicked");
    }

    eprintln!();
    eprintln!("{}", log.summary());
    Ok(())
}

/// Read JSON-line commands from stdin until it closes.
fn spawn_command_reader(commands: Sender<Command>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read command input: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Ignoring malformed command: {e}"),
            }
        }
    });
}

/// Write notifications to stdout, one JSON object per line.
fn spawn_notification_writer(notifications: Receiver<Notification>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for notification in notifications {
            let line = match notification.to_json_line() {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to encode notification: {e}");
                    continue;
                }
            };
            if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                tracing::debug!("stdout closed, stopping notifications");
                break;
            }
        }
    })
}

fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let store = JsonFileStore::new(config.progress_path());

    println!("keypet Status");
    println!("=============");
    println!();

    let has_permission = check_permission();
    println!(
        "Keyboard capture: {}",
        if has_permission {
            "Permitted ✓"
        } else {
            "Not permitted ✗"
        }
    );
    if !has_permission {
        println!("  {}", platform_hint());
    }
    println!();

    let Some(state) = store.load() else {
        println!("No saved progress found.");
        println!("Run 'keypet start' to begin.");
        return Ok(());
    };

    let engine = ProgressionEngine::from_state(state, config.curve);
    let state = engine.state();
    let appearance = Appearance::new(state.level(), 0);

    println!("Name: {}", state.display_name());
    println!(
        "Level {} ({}) {}",
        state.level(),
        appearance.stage,
        appearance.face
    );
    println!(
        "  Progress: {}/{} ({:.0}%)",
        state.session_keystrokes(),
        engine.level_threshold(),
        engine.progress() * 100.0
    );
    println!("  Total keystrokes: {}", state.cumulative_keystrokes());
    Ok(())
}

fn cmd_rename(name: &str) -> Result<()> {
    let config = load_config()?;
    let store = JsonFileStore::new(config.progress_path());

    let mut engine = match store.load() {
        Some(state) => ProgressionEngine::from_state(state, config.curve),
        None => ProgressionEngine::new(config.curve),
    };
    if let Err(e) = engine.rename(name) {
        bail!("{e}");
    }
    store
        .save(engine.state())
        .with_context(|| format!("could not save {}", store.path().display()))?;

    println!("Renamed to {}", engine.state().display_name());
    Ok(())
}

fn cmd_reset() -> Result<()> {
    let config = load_config()?;
    let store = JsonFileStore::new(config.progress_path());
    store
        .clear()
        .with_context(|| format!("could not delete {}", store.path().display()))?;

    println!("All progress deleted.");
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
