//! Virtual console multiplexing.
//!
//! - **manager**: `TtyMultiplexer`, focus switching and lazy session start
//! - **terminal**: `VirtualTerminal`, one slot's surface, pty and spawn flag
//! - **lock**: the yield-spinning render lock
//!
//! # Module Hierarchy
//!
//! ```text
//! mux/
//! ├── mod.rs       - Module exports
//! ├── manager.rs   - TtyMultiplexer (owns all slots)
//! ├── terminal.rs  - VirtualTerminal (surface + PTY + session flag)
//! └── lock.rs      - RenderLock
//! ```

pub mod lock;
pub mod manager;
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{BellTone, TtyMultiplexer, SLOT_COUNT};
