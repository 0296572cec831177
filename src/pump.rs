//! I/O pump threads
//!
//! One thread drains the keyboard into the focused slot; one thread per
//! slot drains that slot's pty into its surface. Each blocks only on its
//! own device, and every surface write goes through the render lock.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::core::discipline::{LineDiscipline, LinePort};
use crate::core::pty::PtyPort;
use crate::core::scancode::{KeyEvent, ScancodeDecoder};
use crate::core::termios::TerminalConfig;
use crate::mux::TtyMultiplexer;
use crate::ui::RenderSurface;

/// Keyboard read size
const KEYBOARD_CHUNK: usize = 5;

/// Pty read size
const OUTPUT_CHUNK: usize = 512;

/// Pause after an empty read or a device error
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Stops pump loops at their next read boundary. A thread blocked inside a
/// read is not woken.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Keyboard-side state: modifier tracking and the line buffer shared by
/// every slot.
pub struct KeyboardPump {
    decoder: ScancodeDecoder,
    discipline: LineDiscipline,
    /// Last settings read from the focused pty
    config: TerminalConfig,
}

impl Default for KeyboardPump {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardPump {
    pub fn new() -> Self {
        Self {
            decoder: ScancodeDecoder::new(),
            discipline: LineDiscipline::new(),
            config: TerminalConfig::default(),
        }
    }

    /// Handle one keyboard read
    pub fn process<S: RenderSurface, P: PtyPort>(
        &mut self,
        bytes: &[u8],
        mux: &TtyMultiplexer<S, P>,
    ) {
        let mut pty = mux.focused_pty();
        self.refresh_config(pty.as_ref());

        for &byte in bytes {
            match self.decoder.feed(byte, mux.decckm()) {
                Some(KeyEvent::Input(key)) => {
                    let mut port = FocusedPort { mux, pty: pty.as_ref() };
                    self.discipline.feed_all(key.as_bytes(), &self.config, true, &mut port);
                }
                Some(KeyEvent::SwitchSlot(slot)) if slot != mux.focused() => {
                    if let Err(e) = mux.switch(slot) {
                        warn!("Switch to slot {} failed: {}", slot, e);
                    }
                    pty = mux.focused_pty();
                    self.refresh_config(pty.as_ref());
                }
                Some(KeyEvent::SwitchSlot(_)) | None => {}
            }
        }
    }

    fn refresh_config<P: PtyPort>(&mut self, pty: &P) {
        match pty.terminal_config() {
            Ok(config) => self.config = config,
            Err(e) => warn!("Keeping previous terminal settings: {}", e),
        }
    }

    /// Read the keyboard until shutdown
    pub fn run<R: Read, S: RenderSurface, P: PtyPort>(
        mut self,
        keyboard: &mut R,
        mux: &TtyMultiplexer<S, P>,
        shutdown: &Shutdown,
    ) {
        let mut buffer = [0u8; KEYBOARD_CHUNK];
        while !shutdown.is_triggered() {
            match keyboard.read(&mut buffer) {
                Ok(0) => thread::sleep(IDLE_BACKOFF),
                Ok(n) => self.process(&buffer[..n], mux),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Keyboard read failed: {}", e);
                    thread::sleep(IDLE_BACKOFF);
                }
            }
        }
    }
}

/// Line discipline sink for the focused slot
struct FocusedPort<'a, S, P> {
    mux: &'a TtyMultiplexer<S, P>,
    pty: &'a P,
}

impl<S: RenderSurface, P: PtyPort> LinePort for FocusedPort<'_, S, P> {
    fn send(&mut self, bytes: &[u8]) {
        if let Err(e) = self.pty.write_input(bytes) {
            warn!("{}", e);
        }
    }

    fn echo(&mut self, bytes: &[u8]) {
        if let Err(e) = self.mux.echo(bytes) {
            warn!("Echo failed: {}", e);
        }
    }
}

/// Copy one slot's session output to its surface until shutdown
pub fn run_output_pump<S: RenderSurface, P: PtyPort>(
    slot: usize,
    pty: &P,
    mux: &TtyMultiplexer<S, P>,
    shutdown: &Shutdown,
) {
    let mut buffer = [0u8; OUTPUT_CHUNK];
    while !shutdown.is_triggered() {
        match pty.read_output(&mut buffer) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                if let Err(e) = mux.write_slot(slot, &buffer[..n]) {
                    warn!("Slot {} render failed: {}", slot, e);
                }
            }
            Err(e) => {
                warn!("Slot {}: {}", slot, e);
                thread::sleep(IDLE_BACKOFF);
            }
        }
    }
}

pub fn spawn_keyboard_pump<R, S, P>(
    mut keyboard: R,
    mux: Arc<TtyMultiplexer<S, P>>,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    S: RenderSurface + 'static,
    P: PtyPort,
{
    thread::Builder::new().name("keyboard".into()).spawn(move || {
        info!("Keyboard pump started");
        KeyboardPump::new().run(&mut keyboard, &mux, &shutdown);
    })
}

pub fn spawn_output_pump<S, P>(
    slot: usize,
    mux: Arc<TtyMultiplexer<S, P>>,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>>
where
    S: RenderSurface + 'static,
    P: PtyPort,
{
    let pty = mux
        .pty(slot)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("no slot {}", slot)))?;
    thread::Builder::new().name(format!("tty{}", slot)).spawn(move || {
        run_output_pump(slot, pty.as_ref(), &mux, &shutdown);
    })
}
