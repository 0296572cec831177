//! Render surfaces
//!
//! A render surface turns one slot's output into pixels (or, here, host
//! terminal cells). Surfaces keep their screen while unfocused; only the
//! surface with autoflush enabled touches the display.

use std::io::{self, Write};

use crate::core::term::{Screen, SurfaceEvent, VtParser};

use super::renderer::Renderer;

/// Receives events raised while a surface parses a write. Called on the
/// writer's stack, with the render lock held.
pub type SurfaceCallback = Box<dyn FnMut(SurfaceEvent) + Send>;

pub trait RenderSurface: Send {
    /// Interpret bytes of session output or echo
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Mark the whole surface for redraw on the next flush
    fn full_refresh(&mut self);

    /// Whether writes reach the display immediately
    fn set_autoflush(&mut self, enabled: bool);

    /// Push pending changes to the display
    fn flush(&mut self) -> io::Result<()>;

    fn set_callback(&mut self, callback: SurfaceCallback);
}

/// Surface drawing onto the host terminal through crossterm
pub struct ConsoleSurface<W: Write + Send = io::Stdout> {
    screen: Screen,
    parser: VtParser,
    renderer: Renderer<W>,
    autoflush: bool,
    callback: Option<SurfaceCallback>,
}

impl ConsoleSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_renderer(cols, rows, Renderer::stdout())
    }
}

impl<W: Write + Send> ConsoleSurface<W> {
    pub fn with_renderer(cols: u16, rows: u16, renderer: Renderer<W>) -> Self {
        Self {
            screen: Screen::new(cols, rows),
            parser: VtParser::new(),
            renderer,
            autoflush: false,
            callback: None,
        }
    }

    #[cfg(test)]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }
}

impl<W: Write + Send> RenderSurface for ConsoleSurface<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            if let Some(event) = self.parser.feed(b, &mut self.screen) {
                if let Some(callback) = self.callback.as_mut() {
                    callback(event);
                }
            }
        }
        if self.autoflush {
            self.flush()?;
        }
        Ok(())
    }

    fn full_refresh(&mut self) {
        self.screen.mark_all_dirty();
    }

    fn set_autoflush(&mut self, enabled: bool) {
        self.autoflush = enabled;
    }

    fn flush(&mut self) -> io::Result<()> {
        let rows = self.screen.take_dirty();
        self.renderer.draw(&self.screen, &rows)
    }

    fn set_callback(&mut self, callback: SurfaceCallback) {
        self.callback = Some(callback);
    }
}
