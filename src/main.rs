//! vtcon - virtual console multiplexer
//!
//! Eight terminal sessions share one keyboard and one display. Raw PC
//! scancodes are decoded, run through a line discipline, and written to the
//! focused session's pseudo-terminal; every session's output is kept on its
//! own surface and drawn while that session has focus.
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Alt+F1 .. Alt+F8 | Focus virtual terminal 1 .. 8 |
//!
//! Sessions start on first focus and are never restarted. Configuration is
//! described in [`config`].

mod config;
mod core;
mod mux;
mod pump;
mod ui;

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{Config, LogConfig};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the configured log filter
const LOG_ENV: &str = "VTCON_LOG";

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config.log);
    info!("vtcon {} starting", VERSION);
    run(config)
}

/// Log to a file: the terminal itself is the display. Logging stays off
/// when the file cannot be opened.
fn init_logging(log: &LogConfig) {
    let Some(file) = open_log(&log.path) else {
        return;
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&log.level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn open_log(path: &Path) -> Option<std::fs::File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

#[cfg(unix)]
fn run(config: Config) -> anyhow::Result<()> {
    use std::fs::File;
    use std::sync::Arc;

    use tracing::{error, warn};

    use crate::core::pty::{UnixPty, WindowSize};
    use crate::core::speaker::{BellWorker, PcSpeaker, Speaker};
    use crate::core::termios::TerminalConfig;
    use crate::mux::{TtyMultiplexer, SLOT_COUNT};
    use crate::pump::{self, Shutdown};
    use crate::ui::{renderer, ConsoleSurface};

    let keyboard = File::open(&config.devices.keyboard)
        .with_context(|| format!("Failed to open keyboard {}", config.devices.keyboard.display()))?;

    let speaker: Option<Arc<dyn Speaker>> =
        match PcSpeaker::open(&config.devices.speaker).and_then(BellWorker::spawn) {
            Ok(worker) => Some(Arc::new(worker)),
            Err(e) => {
                warn!("Bell disabled, {}: {}", config.devices.speaker.display(), e);
                None
            }
        };

    renderer::init().context("Failed to initialize display")?;
    let (cols, rows) = renderer::size().unwrap_or((config.display.cols, config.display.rows));
    let size = WindowSize { cols, rows, xpixel: 0, ypixel: 0 };

    let termios = TerminalConfig::default();
    let pairs = (0..SLOT_COUNT)
        .map(|slot| {
            let pty = UnixPty::open(&termios, size)
                .with_context(|| format!("Failed to allocate pty for slot {}", slot))?;
            Ok((ConsoleSurface::new(cols, rows), pty))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mux = Arc::new(TtyMultiplexer::new(
        pairs,
        config.session_command(),
        speaker,
        config.bell_tone(),
    )?);
    mux.switch(0).context("Failed to start the first session")?;

    let shutdown = Shutdown::new();
    let mut handles = Vec::with_capacity(SLOT_COUNT + 1);
    for slot in 0..SLOT_COUNT {
        handles.push(pump::spawn_output_pump(slot, Arc::clone(&mux), shutdown.clone())?);
    }
    handles.push(pump::spawn_keyboard_pump(keyboard, Arc::clone(&mux), shutdown)?);
    info!("Console ready ({}x{})", cols, rows);

    for handle in handles {
        if handle.join().is_err() {
            error!("Pump thread panicked");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn run(_config: Config) -> anyhow::Result<()> {
    anyhow::bail!("vtcon requires Unix pseudo-terminals")
}
