//! VirtualTerminal - one console slot

use std::sync::Arc;

use crate::core::pty::{self, PtyPort, SessionCommand};
use crate::ui::RenderSurface;

/// A slot: its own surface, its own pty, and at most one session
pub struct VirtualTerminal<S, P> {
    pub id: usize,
    pub surface: S,
    pub pty: Arc<P>,
    session_spawned: bool,
}

impl<S: RenderSurface, P: PtyPort> VirtualTerminal<S, P> {
    pub fn new(id: usize, surface: S, pty: Arc<P>) -> Self {
        Self { id, surface, pty, session_spawned: false }
    }

    pub fn session_spawned(&self) -> bool {
        self.session_spawned
    }

    /// Start the session unless one is already running. Returns the new
    /// process id, or `None` when the slot was already spawned. A failed
    /// spawn leaves the slot unspawned.
    pub fn ensure_session(&mut self, command: &SessionCommand) -> pty::Result<Option<u32>> {
        if self.session_spawned {
            return Ok(None);
        }
        let pid = self.pty.spawn_session(command)?;
        self.session_spawned = true;
        Ok(Some(pid))
    }
}
