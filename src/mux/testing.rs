//! In-memory stand-ins for the multiplexer's collaborators

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::pty::{self, PtyError, PtyPort, SessionCommand};
use crate::core::speaker::Speaker;
use crate::core::termios::TerminalConfig;
use crate::ui::{RenderSurface, SurfaceCallback};

#[derive(Default)]
pub struct FakeSurface {
    pub written: Vec<u8>,
    pub autoflush: bool,
    pub refreshes: usize,
    pub flushes: usize,
    pub callback: Option<SurfaceCallback>,
}

impl RenderSurface for FakeSurface {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn full_refresh(&mut self) {
        self.refreshes += 1;
    }

    fn set_autoflush(&mut self, enabled: bool) {
        self.autoflush = enabled;
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn set_callback(&mut self, callback: SurfaceCallback) {
        self.callback = Some(callback);
    }
}

pub struct FakePty {
    pub input: Mutex<Vec<u8>>,
    /// `None` makes `terminal_config` fail
    pub config: Mutex<Option<TerminalConfig>>,
    pub output: Mutex<VecDeque<Vec<u8>>>,
    pub spawns: AtomicUsize,
    pub fail_spawn: AtomicBool,
}

impl Default for FakePty {
    fn default() -> Self {
        Self {
            input: Mutex::new(Vec::new()),
            config: Mutex::new(Some(TerminalConfig::default())),
            output: Mutex::new(VecDeque::new()),
            spawns: AtomicUsize::new(0),
            fail_spawn: AtomicBool::new(false),
        }
    }
}

impl FakePty {
    pub fn input(&self) -> Vec<u8> {
        self.input.lock().unwrap().clone()
    }

    pub fn set_config(&self, config: Option<TerminalConfig>) {
        *self.config.lock().unwrap() = config;
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl PtyPort for FakePty {
    fn write_input(&self, data: &[u8]) -> pty::Result<()> {
        self.input.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    /// Pops one queued chunk; an empty queue reads as end of file
    fn read_output(&self, buffer: &mut [u8]) -> pty::Result<usize> {
        match self.output.lock().unwrap().pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn terminal_config(&self) -> pty::Result<TerminalConfig> {
        let config = *self.config.lock().unwrap();
        config.ok_or_else(|| {
            PtyError::Attributes(io::Error::new(io::ErrorKind::Other, "no attributes"))
        })
    }

    fn spawn_session(&self, command: &SessionCommand) -> pty::Result<u32> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(PtyError::Spawn {
                program: command.program.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such program"),
            });
        }
        Ok(100 + self.spawns.fetch_add(1, Ordering::SeqCst) as u32)
    }
}

#[derive(Default)]
pub struct RecordingSpeaker {
    pub tones: Mutex<Vec<(u32, Duration)>>,
}

impl Speaker for RecordingSpeaker {
    fn tone(&self, frequency: u32, duration: Duration) {
        self.tones.lock().unwrap().push((frequency, duration));
    }
}
