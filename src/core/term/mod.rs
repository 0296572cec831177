//! Terminal emulation for the host render surface
//!
//! - **screen**: retained cell grid, cursor and dirty rows of one slot
//! - **parser**: VT sequence parser feeding a screen and reporting events

mod parser;
mod screen;

pub use parser::{SurfaceEvent, VtParser};
pub use screen::{AttrFlags, Pen, Screen};
