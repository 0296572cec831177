//! Retained screen contents of one virtual terminal
//!
//! Every slot keeps drawing into its own screen while unfocused, so a
//! switch can redraw it in full from here.

use std::collections::BTreeSet;

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b0001;
        const UNDERLINE = 0b0010;
        const INVERSE   = 0b0100;
        const BLINK     = 0b1000;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn to_crossterm(self) -> crossterm::style::Color {
        match self {
            Color::Default => crossterm::style::Color::Reset,
            Color::Indexed(n) => crossterm::style::Color::AnsiValue(n),
            Color::Rgb(r, g, b) => crossterm::style::Color::Rgb { r, g, b },
        }
    }
}

/// Graphic rendition applied to newly written cells
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    /// 0 marks the right half of a wide character
    pub width: u8,
    pub pen: Pen,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Pen::default())
    }
}

impl Cell {
    /// Erased cells keep the background of the pen that erased them
    fn blank(pen: Pen) -> Self {
        Self {
            ch: ' ',
            width: 1,
            pen: Pen { bg: pen.bg, ..Pen::default() },
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

pub struct Screen {
    pub cols: u16,
    pub rows: u16,
    lines: Vec<Vec<Cell>>,
    pub cursor: Cursor,
    pub cursor_visible: bool,
    pub pen: Pen,
    saved: Option<(Cursor, Pen)>,
    /// Inclusive, 0-based
    scroll_region: (u16, u16),
    /// Cursor sits past the last column; the next glyph wraps first
    wrap_pending: bool,
    dirty: BTreeSet<u16>,
    full_redraw: bool,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            lines: vec![vec![Cell::default(); cols as usize]; rows as usize],
            cursor: Cursor::default(),
            cursor_visible: true,
            pen: Pen::default(),
            saved: None,
            scroll_region: (0, rows - 1),
            wrap_pending: false,
            dirty: BTreeSet::new(),
            full_redraw: true,
        }
    }

    pub fn line(&self, row: u16) -> &[Cell] {
        &self.lines[row as usize]
    }

    /// Text of a row with trailing blanks removed
    pub fn row_text(&self, row: u16) -> String {
        let text: String = self
            .line(row)
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| c.ch)
            .collect();
        text.trim_end().to_string()
    }

    pub fn put_char(&mut self, ch: char) {
        let width = match ch.width() {
            Some(0) | None => return,
            Some(w) => w.min(2) as u16,
        };
        if width > self.cols {
            return;
        }

        if self.wrap_pending || self.cursor.col + width > self.cols {
            self.wrap_pending = false;
            self.cursor.col = 0;
            self.linefeed();
        }

        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        let pen = self.pen;
        let line = &mut self.lines[row];
        // never leave half of a wide character behind
        if line[col].is_continuation() && col > 0 {
            line[col - 1] = Cell::blank(pen);
        }
        if line[col].width == 2 && width == 1 && col + 1 < line.len() {
            line[col + 1] = Cell::blank(pen);
        }
        line[col] = Cell { ch, width: width as u8, pen };
        if width == 2 {
            line[col + 1] = Cell { ch: ' ', width: 0, pen };
        }
        self.dirty.insert(self.cursor.row);

        let next = self.cursor.col + width;
        if next >= self.cols {
            self.cursor.col = self.cols - 1;
            self.wrap_pending = true;
        } else {
            self.cursor.col = next;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
        self.wrap_pending = false;
    }

    pub fn linefeed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_region.1 {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    pub fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
    }

    pub fn backspace(&mut self) {
        self.wrap_pending = false;
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    pub fn tab(&mut self) {
        self.wrap_pending = false;
        self.cursor.col = ((self.cursor.col / 8 + 1) * 8).min(self.cols - 1);
    }

    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let blank = vec![Cell::blank(self.pen); self.cols as usize];
        for _ in 0..n.min(bottom - top + 1) {
            self.lines.remove(top as usize);
            self.lines.insert(bottom as usize, blank.clone());
        }
        self.full_redraw = true;
    }

    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let blank = vec![Cell::blank(self.pen); self.cols as usize];
        for _ in 0..n.min(bottom - top + 1) {
            self.lines.remove(bottom as usize);
            self.lines.insert(top as usize, blank.clone());
        }
        self.full_redraw = true;
    }

    /// Relative motion; `dr`/`dc` are clamped to the screen
    pub fn move_cursor(&mut self, dr: i32, dc: i32) {
        let row = (self.cursor.row as i32 + dr).clamp(0, self.rows as i32 - 1);
        let col = (self.cursor.col as i32 + dc).clamp(0, self.cols as i32 - 1);
        self.cursor = Cursor { row: row as u16, col: col as u16 };
        self.wrap_pending = false;
    }

    /// Absolute position, 1-based as in CUP
    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = Cursor {
            row: row.saturating_sub(1).min(self.rows - 1),
            col: col.saturating_sub(1).min(self.cols - 1),
        };
        self.wrap_pending = false;
    }

    pub fn set_col(&mut self, col: u16) {
        self.set_cursor(self.cursor.row + 1, col);
    }

    pub fn set_row(&mut self, row: u16) {
        self.set_cursor(row, self.cursor.col + 1);
    }

    fn clear_cells(&mut self, row: u16, from: u16, to: u16) {
        let blank = Cell::blank(self.pen);
        let line = &mut self.lines[row as usize];
        for cell in &mut line[from as usize..to.min(self.cols) as usize] {
            *cell = blank;
        }
        self.dirty.insert(row);
    }

    pub fn erase_in_display(&mut self, mode: u16) {
        let Cursor { row, col } = self.cursor;
        match mode {
            0 => {
                self.clear_cells(row, col, self.cols);
                for r in row + 1..self.rows {
                    self.clear_cells(r, 0, self.cols);
                }
            }
            1 => {
                for r in 0..row {
                    self.clear_cells(r, 0, self.cols);
                }
                self.clear_cells(row, 0, col + 1);
            }
            2 | 3 => {
                for r in 0..self.rows {
                    self.clear_cells(r, 0, self.cols);
                }
            }
            _ => {}
        }
    }

    pub fn erase_in_line(&mut self, mode: u16) {
        let Cursor { row, col } = self.cursor;
        match mode {
            0 => self.clear_cells(row, col, self.cols),
            1 => self.clear_cells(row, 0, col + 1),
            2 => self.clear_cells(row, 0, self.cols),
            _ => {}
        }
    }

    pub fn erase_chars(&mut self, n: u16) {
        let Cursor { row, col } = self.cursor;
        self.clear_cells(row, col, col.saturating_add(n));
    }

    pub fn insert_chars(&mut self, n: u16) {
        let blank = Cell::blank(self.pen);
        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        let line = &mut self.lines[row];
        for _ in 0..n.min(self.cols) {
            line.pop();
            line.insert(col, blank);
        }
        self.dirty.insert(self.cursor.row);
    }

    pub fn delete_chars(&mut self, n: u16) {
        let blank = Cell::blank(self.pen);
        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        let line = &mut self.lines[row];
        for _ in 0..n.min(self.cols) {
            line.remove(col);
            line.push(blank);
        }
        self.dirty.insert(self.cursor.row);
    }

    /// IL/DL only act inside the scroll region
    pub fn insert_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        if self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let saved = self.scroll_region;
        self.scroll_region = (self.cursor.row, bottom);
        self.scroll_down(n);
        self.scroll_region = saved;
    }

    pub fn delete_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        if self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let saved = self.scroll_region;
        self.scroll_region = (self.cursor.row, bottom);
        self.scroll_up(n);
        self.scroll_region = saved;
    }

    /// DECSTBM, 1-based; `None` bottom means the last row
    pub fn set_scroll_region(&mut self, top: u16, bottom: Option<u16>) {
        let top = top.max(1) - 1;
        let bottom = bottom.unwrap_or(self.rows).clamp(1, self.rows) - 1;
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
        self.set_cursor(1, 1);
    }

    pub fn save_cursor(&mut self) {
        self.saved = Some((self.cursor, self.pen));
    }

    pub fn restore_cursor(&mut self) {
        if let Some((cursor, pen)) = self.saved {
            self.cursor = cursor;
            self.pen = pen;
            self.wrap_pending = false;
        }
    }

    /// RIS
    pub fn reset(&mut self) {
        *self = Self::new(self.cols, self.rows);
    }

    pub fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    /// Rows to redraw, clearing the dirty state
    pub fn take_dirty(&mut self) -> Vec<u16> {
        let rows = if self.full_redraw {
            (0..self.rows).collect()
        } else {
            self.dirty.iter().copied().collect()
        };
        self.dirty.clear();
        self.full_redraw = false;
        rows
    }
}
