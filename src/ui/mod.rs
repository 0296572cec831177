//! Display output.
//!
//! - **renderer**: crossterm drawing of a retained screen onto the host terminal
//! - **surface**: `RenderSurface` seam and the `ConsoleSurface` implementation
//!
//! Every slot owns a surface. Only the focused one has autoflush enabled, so
//! only it reaches the display; the rest keep their screens for the next
//! switch.

pub mod renderer;
pub mod surface;

pub use surface::{ConsoleSurface, RenderSurface, SurfaceCallback};
