//! TtyMultiplexer - focus switching among the console slots

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::pty::{PtyError, PtyPort, SessionCommand};
use crate::core::speaker::Speaker;
use crate::core::term::SurfaceEvent;
use crate::ui::{RenderSurface, SurfaceCallback};

use super::lock::RenderLock;
use super::terminal::VirtualTerminal;

/// Number of virtual terminals, one per Alt+F1..F8
pub const SLOT_COUNT: usize = 8;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("Slot {0} out of range")]
    InvalidSlot(usize),

    #[error("Expected 8 slots, got {0}")]
    SlotCount(usize),

    #[error("Failed to start session on slot {slot}: {source}")]
    Spawn {
        slot: usize,
        #[source]
        source: PtyError,
    },

    #[error("Render surface error: {0}")]
    Render(#[from] io::Error),
}

/// Tone played for BEL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BellTone {
    pub frequency: u32,
    pub duration: Duration,
}

impl Default for BellTone {
    fn default() -> Self {
        Self { frequency: 1000, duration: Duration::from_millis(100) }
    }
}

struct MuxState<S, P> {
    slots: Vec<VirtualTerminal<S, P>>,
    focused: usize,
}

/// Owns every slot. Surface writes, spawn flags and the focused index all
/// live behind one render lock.
pub struct TtyMultiplexer<S, P> {
    state: RenderLock<MuxState<S, P>>,
    /// Same handles as the slots hold, reachable without the lock so output
    /// pumps can block in reads
    ptys: Vec<Arc<P>>,
    decckm: Arc<AtomicBool>,
    command: SessionCommand,
}

impl<S: RenderSurface, P: PtyPort> TtyMultiplexer<S, P> {
    /// Build the multiplexer from exactly `SLOT_COUNT` surface/pty pairs.
    /// Every surface starts unfocused with the event callback installed;
    /// nothing is spawned until the first `switch`.
    pub fn new(
        pairs: Vec<(S, P)>,
        command: SessionCommand,
        speaker: Option<Arc<dyn Speaker>>,
        bell: BellTone,
    ) -> Result<Self, MuxError> {
        if pairs.len() != SLOT_COUNT {
            return Err(MuxError::SlotCount(pairs.len()));
        }

        let decckm = Arc::new(AtomicBool::new(false));
        let mut slots = Vec::with_capacity(SLOT_COUNT);
        let mut ptys = Vec::with_capacity(SLOT_COUNT);
        for (id, (mut surface, pty)) in pairs.into_iter().enumerate() {
            surface.set_autoflush(false);
            surface.set_callback(event_handler(Arc::clone(&decckm), speaker.clone(), bell));
            let pty = Arc::new(pty);
            ptys.push(Arc::clone(&pty));
            slots.push(VirtualTerminal::new(id, surface, pty));
        }

        Ok(Self {
            state: RenderLock::new(MuxState { slots, focused: 0 }),
            ptys,
            decckm,
            command,
        })
    }

    /// Move focus to `target`, redraw it, and start its session if this
    /// is the first visit.
    pub fn switch(&self, target: usize) -> Result<(), MuxError> {
        if target >= SLOT_COUNT {
            return Err(MuxError::InvalidSlot(target));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.slots[state.focused].surface.set_autoflush(false);

        let incoming = &mut state.slots[target];
        incoming.surface.set_autoflush(true);
        incoming.surface.full_refresh();
        if let Err(e) = incoming.surface.flush() {
            warn!("Redraw of slot {} failed: {}", target, e);
        }
        state.focused = target;
        info!("Focused slot {}", target);

        match incoming.ensure_session(&self.command) {
            Ok(Some(pid)) => {
                let program = self.command.program.display();
                info!("Started {} on slot {} (pid {})", program, target, pid);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(source) => {
                error!("Failed to start session on slot {}: {}", target, source);
                Err(MuxError::Spawn { slot: target, source })
            }
        }
    }

    pub fn focused(&self) -> usize {
        self.state.lock().focused
    }

    /// Whether arrow keys use application (SS3) form
    pub fn decckm(&self) -> bool {
        self.decckm.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn set_decckm(&self, enabled: bool) {
        self.decckm.store(enabled, Ordering::SeqCst);
    }

    /// Write session output to a slot's surface, focused or not
    pub fn write_slot(&self, slot: usize, bytes: &[u8]) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        let terminal = state.slots.get_mut(slot).ok_or(MuxError::InvalidSlot(slot))?;
        terminal.surface.write(bytes)?;
        Ok(())
    }

    /// Write to the focused surface
    pub fn echo(&self, bytes: &[u8]) -> Result<(), MuxError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.slots[state.focused].surface.write(bytes)?;
        Ok(())
    }

    pub fn focused_pty(&self) -> Arc<P> {
        let focused = self.focused();
        Arc::clone(&self.ptys[focused])
    }

    pub fn pty(&self, slot: usize) -> Option<Arc<P>> {
        self.ptys.get(slot).cloned()
    }

    #[allow(dead_code)]
    pub fn is_spawned(&self, slot: usize) -> bool {
        self.state.lock().slots.get(slot).map_or(false, |t| t.session_spawned())
    }

    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, slot: usize, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.lock().slots[slot].surface)
    }
}

/// Callback installed on every surface. Runs with the render lock held, so
/// it only flips the mode flag or queues a tone.
fn event_handler(
    decckm: Arc<AtomicBool>,
    speaker: Option<Arc<dyn Speaker>>,
    bell: BellTone,
) -> SurfaceCallback {
    Box::new(move |event| match event {
        SurfaceEvent::DecPrivateMode { params, final_byte } => {
            if params.first() != Some(&1) {
                return;
            }
            let enabled = match final_byte {
                b'h' => true,
                b'l' => false,
                _ => return,
            };
            debug!("DECCKM {}", if enabled { "on" } else { "off" });
            decckm.store(enabled, Ordering::SeqCst);
        }
        SurfaceEvent::Bell => {
            if let Some(speaker) = &speaker {
                speaker.tone(bell.frequency, bell.duration);
            }
        }
    })
}
