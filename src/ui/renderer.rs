//! Terminal renderer using crossterm
//!
//! Draws a slot's retained screen onto the host display. Only the focused
//! slot's surface ever calls into it, and always under the render lock.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnterAlternateScreen},
};

use crate::core::term::{AttrFlags, Pen, Screen};

/// Prepare the host terminal: raw mode, alternate screen, no wrapping.
/// There is no teardown; the console runs until the process dies.
pub fn init() -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    queue!(stdout, EnterAlternateScreen, DisableLineWrap, Clear(ClearType::All), MoveTo(0, 0))?;
    stdout.flush()
}

/// Host display size, if it can be queried
pub fn size() -> Option<(u16, u16)> {
    terminal::size().ok().filter(|&(cols, rows)| cols > 0 && rows > 0)
}

/// Draws screens to a writer
pub struct Renderer<W: Write> {
    out: W,
}

impl Renderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Redraw the given rows and place the cursor
    pub fn draw(&mut self, screen: &Screen, rows: &[u16]) -> io::Result<()> {
        queue!(self.out, Hide)?;
        for &row in rows {
            self.draw_row(screen, row)?;
        }
        queue!(self.out, ResetColor, SetAttribute(Attribute::Reset))?;
        queue!(self.out, MoveTo(screen.cursor.col, screen.cursor.row))?;
        if screen.cursor_visible {
            queue!(self.out, Show)?;
        }
        self.out.flush()
    }

    fn draw_row(&mut self, screen: &Screen, row: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(0, row))?;
        let mut current: Option<Pen> = None;
        let mut run = String::new();
        for cell in screen.line(row) {
            if cell.is_continuation() {
                continue;
            }
            if current != Some(cell.pen) {
                if let Some(pen) = current {
                    self.flush_run(&pen, &mut run)?;
                }
                current = Some(cell.pen);
            }
            run.push(cell.ch);
        }
        if let Some(pen) = current {
            self.flush_run(&pen, &mut run)?;
        }
        Ok(())
    }

    fn flush_run(&mut self, pen: &Pen, run: &mut String) -> io::Result<()> {
        queue!(
            self.out,
            SetAttribute(Attribute::Reset),
            SetForegroundColor(pen.fg.to_crossterm()),
            SetBackgroundColor(pen.bg.to_crossterm())
        )?;
        for (flag, attr) in [
            (AttrFlags::BOLD, Attribute::Bold),
            (AttrFlags::UNDERLINE, Attribute::Underlined),
            (AttrFlags::INVERSE, Attribute::Reverse),
            (AttrFlags::BLINK, Attribute::SlowBlink),
        ] {
            if pen.flags.contains(flag) {
                queue!(self.out, SetAttribute(attr))?;
            }
        }
        queue!(self.out, Print(run.as_str()))?;
        run.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_writes_row_text() {
        let mut screen = Screen::new(8, 2);
        for ch in "hi".chars() {
            screen.put_char(ch);
        }
        let mut renderer = Renderer::new(Vec::new());
        renderer.draw(&screen, &[0]).unwrap();

        let out = String::from_utf8_lossy(renderer.output());
        assert!(out.contains("hi      "));
    }
}
