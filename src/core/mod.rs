//! Core console components.
//!
//! - **scancode**: PC scancode to key event decoder
//! - **discipline**: canonical/raw line discipline with echo
//! - **termios**: typed terminal settings read from each pseudo-terminal
//! - **pty**: Unix pseudo-terminal pairs and session spawning
//! - **speaker**: PC speaker bell
//! - **term**: screen model and VT parser behind the host render surface
//!
//! # Data flow
//!
//! ```text
//! keyboard ─► ScancodeDecoder ─► LineDiscipline ─► pty master ─► session
//!                                      │                            │
//!                                      └─ echo ─► RenderSurface ◄───┘ output
//! ```

pub mod discipline;
pub mod pty;
pub mod scancode;
pub mod speaker;
pub mod term;
pub mod termios;
