//! VT sequence parser
//!
//! Parses session output into screen updates. The two sequences the
//! console itself reacts to, DEC private mode changes and the bell, are
//! returned to the caller as events.

use super::screen::{AttrFlags, Color, Screen};

/// Notification raised while parsing output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// `CSI ? Pn ; ... h` or `l`
    DecPrivateMode { params: Vec<u16>, final_byte: u8 },
    /// BEL outside of an OSC string
    Bell,
}

/// Parser state machine
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    intermediates: Vec<u8>,
    current_param: Option<u16>,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

#[derive(Clone, Copy, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    EscapeInOsc,
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            current_param: None,
            utf8: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Feed a single byte to the parser
    pub fn feed(&mut self, byte: u8, screen: &mut Screen) -> Option<SurfaceEvent> {
        let in_osc = matches!(self.state, ParserState::OscString | ParserState::EscapeInOsc);
        if byte < 0x20 && !in_osc {
            return self.control(byte, screen);
        }

        match self.state {
            ParserState::Ground => self.ground(byte, screen),
            ParserState::Escape => self.escape(byte, screen),
            ParserState::EscapeIntermediate => {
                if !(0x20..=0x2f).contains(&byte) {
                    // charset designations and the like
                    self.state = ParserState::Ground;
                }
            }
            ParserState::CsiEntry | ParserState::CsiParam => return self.csi_param(byte, screen),
            ParserState::CsiIntermediate => match byte {
                0x20..=0x2f => self.intermediates.push(byte),
                0x40..=0x7e => return self.execute_csi(byte, screen),
                _ => self.state = ParserState::Ground,
            },
            ParserState::OscString => match byte {
                0x07 | 0x9c => self.state = ParserState::Ground,
                0x1b => self.state = ParserState::EscapeInOsc,
                _ => {}
            },
            ParserState::EscapeInOsc => {
                if byte == b'\\' {
                    self.state = ParserState::Ground;
                } else {
                    self.enter_escape();
                    self.escape(byte, screen);
                }
            }
        }
        None
    }

    /// C0 controls act in every state except inside OSC strings
    fn control(&mut self, byte: u8, screen: &mut Screen) -> Option<SurfaceEvent> {
        match byte {
            0x1b => self.enter_escape(),
            0x07 => return Some(SurfaceEvent::Bell),
            0x08 => screen.backspace(),
            0x09 => screen.tab(),
            0x0a..=0x0c => screen.linefeed(),
            0x0d => screen.carriage_return(),
            0x18 | 0x1a => self.state = ParserState::Ground,
            _ => {}
        }
        None
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    fn ground(&mut self, byte: u8, screen: &mut Screen) {
        match byte {
            0x20..=0x7e => {
                self.utf8_need = 0;
                screen.put_char(byte as char);
            }
            0x7f => {}
            0xc0..=0xf7 => {
                self.utf8[0] = byte;
                self.utf8_len = 1;
                self.utf8_need = match byte {
                    0xc0..=0xdf => 2,
                    0xe0..=0xef => 3,
                    _ => 4,
                };
            }
            0x80..=0xbf if self.utf8_need > 0 => {
                self.utf8[self.utf8_len] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    self.utf8_need = 0;
                    let ch = std::str::from_utf8(&self.utf8[..self.utf8_len])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    screen.put_char(ch);
                }
            }
            _ => {
                self.utf8_need = 0;
                screen.put_char(char::REPLACEMENT_CHARACTER);
            }
        }
    }

    fn escape(&mut self, byte: u8, screen: &mut Screen) {
        self.state = ParserState::Ground;
        match byte {
            b'[' => self.state = ParserState::CsiEntry,
            b']' => self.state = ParserState::OscString,
            b'7' => screen.save_cursor(),
            b'8' => screen.restore_cursor(),
            b'D' => screen.linefeed(),
            b'E' => {
                screen.carriage_return();
                screen.linefeed();
            }
            b'M' => screen.reverse_index(),
            b'c' => screen.reset(),
            0x20..=0x2f => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {}
        }
    }

    fn csi_param(&mut self, byte: u8, screen: &mut Screen) -> Option<SurfaceEvent> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                let value = self.current_param.unwrap_or(0);
                self.current_param = Some(value.saturating_mul(10).saturating_add(digit));
                self.state = ParserState::CsiParam;
            }
            b';' | b':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'=' | b'!' if self.state == ParserState::CsiEntry => {
                self.intermediates.push(byte);
            }
            0x20..=0x2f => {
                self.finish_param();
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7e => return self.execute_csi(byte, screen),
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn finish_param(&mut self) {
        if let Some(p) = self.current_param.take() {
            self.params.push(p);
        }
    }

    /// First parameter, with 0 or missing meaning `default`
    fn arg(&self, default: u16) -> u16 {
        match self.params.first() {
            Some(&0) | None => default,
            Some(&n) => n,
        }
    }

    fn execute_csi(&mut self, final_byte: u8, screen: &mut Screen) -> Option<SurfaceEvent> {
        self.finish_param();
        self.state = ParserState::Ground;

        if self.intermediates.first() == Some(&b'?') {
            return match final_byte {
                b'h' | b'l' => {
                    let enable = final_byte == b'h';
                    if self.params.contains(&25) {
                        screen.cursor_visible = enable;
                    }
                    Some(SurfaceEvent::DecPrivateMode {
                        params: self.params.clone(),
                        final_byte,
                    })
                }
                _ => None,
            };
        }
        if !self.intermediates.is_empty() {
            return None;
        }

        let n = self.arg(1);
        match final_byte {
            b'A' => screen.move_cursor(-(n as i32), 0),
            b'B' | b'e' => screen.move_cursor(n as i32, 0),
            b'C' | b'a' => screen.move_cursor(0, n as i32),
            b'D' => screen.move_cursor(0, -(n as i32)),
            b'E' => {
                screen.move_cursor(n as i32, 0);
                screen.carriage_return();
            }
            b'F' => {
                screen.move_cursor(-(n as i32), 0);
                screen.carriage_return();
            }
            b'G' | b'`' => screen.set_col(n),
            b'd' => screen.set_row(n),
            b'H' | b'f' => {
                let col = match self.params.get(1) {
                    Some(&0) | None => 1,
                    Some(&c) => c,
                };
                screen.set_cursor(n, col);
            }
            b'J' => screen.erase_in_display(self.params.first().copied().unwrap_or(0)),
            b'K' => screen.erase_in_line(self.params.first().copied().unwrap_or(0)),
            b'L' => screen.insert_lines(n),
            b'M' => screen.delete_lines(n),
            b'@' => screen.insert_chars(n),
            b'P' => screen.delete_chars(n),
            b'X' => screen.erase_chars(n),
            b'S' => screen.scroll_up(n),
            b'T' => screen.scroll_down(n),
            b'r' => {
                let bottom = self.params.get(1).copied().filter(|&b| b > 0);
                screen.set_scroll_region(self.arg(1), bottom);
            }
            b's' => screen.save_cursor(),
            b'u' => screen.restore_cursor(),
            b'm' => self.execute_sgr(screen),
            _ => {
                tracing::debug!(
                    "Unhandled CSI: params={:?}, final={:?}",
                    self.params,
                    final_byte as char
                );
            }
        }
        None
    }

    fn execute_sgr(&self, screen: &mut Screen) {
        let pen = &mut screen.pen;
        if self.params.is_empty() {
            *pen = Default::default();
            return;
        }

        let mut iter = self.params.iter().copied();
        while let Some(param) = iter.next() {
            match param {
                0 => *pen = Default::default(),
                1 => pen.flags |= AttrFlags::BOLD,
                4 => pen.flags |= AttrFlags::UNDERLINE,
                5 => pen.flags |= AttrFlags::BLINK,
                7 => pen.flags |= AttrFlags::INVERSE,
                21 | 22 => pen.flags -= AttrFlags::BOLD,
                24 => pen.flags -= AttrFlags::UNDERLINE,
                25 => pen.flags -= AttrFlags::BLINK,
                27 => pen.flags -= AttrFlags::INVERSE,
                30..=37 => pen.fg = Color::Indexed((param - 30) as u8),
                39 => pen.fg = Color::Default,
                40..=47 => pen.bg = Color::Indexed((param - 40) as u8),
                49 => pen.bg = Color::Default,
                90..=97 => pen.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => pen.bg = Color::Indexed((param - 100 + 8) as u8),
                38 | 48 => {
                    let color = match iter.next() {
                        Some(5) => iter.next().map(|n| Color::Indexed(n as u8)),
                        Some(2) => {
                            let mut channel = || iter.next().unwrap_or(0) as u8;
                            Some(Color::Rgb(channel(), channel(), channel()))
                        }
                        _ => None,
                    };
                    if let Some(color) = color {
                        if param == 38 {
                            pen.fg = color;
                        } else {
                            pen.bg = color;
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::screen::Cursor;

    fn feed(parser: &mut VtParser, screen: &mut Screen, bytes: &[u8]) -> Vec<SurfaceEvent> {
        bytes.iter().filter_map(|&b| parser.feed(b, screen)).collect()
    }

    #[test]
    fn test_cursor_movement() {
        let mut screen = Screen::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut screen, b"\x1b[5;10H");
        assert_eq!(screen.cursor, Cursor { row: 4, col: 9 });

        feed(&mut parser, &mut screen, b"\x1b[2A\x1b[3D");
        assert_eq!(screen.cursor, Cursor { row: 2, col: 6 });
    }

    #[test]
    fn test_sgr_colors() {
        let mut screen = Screen::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut screen, b"\x1b[1;31m");
        assert_eq!(screen.pen.fg, Color::Indexed(1));
        assert!(screen.pen.flags.contains(AttrFlags::BOLD));

        feed(&mut parser, &mut screen, b"\x1b[38;2;1;2;3;48;5;200m");
        assert_eq!(screen.pen.fg, Color::Rgb(1, 2, 3));
        assert_eq!(screen.pen.bg, Color::Indexed(200));

        feed(&mut parser, &mut screen, b"\x1b[m");
        assert_eq!(screen.pen, Default::default());
    }

    #[test]
    fn test_dec_private_mode_is_reported() {
        let mut screen = Screen::new(80, 24);
        let mut parser = VtParser::new();

        let events = feed(&mut parser, &mut screen, b"\x1b[?1h");
        assert_eq!(
            events,
            vec![SurfaceEvent::DecPrivateMode { params: vec![1], final_byte: b'h' }]
        );

        let events = feed(&mut parser, &mut screen, b"\x1b[?25;1l");
        assert_eq!(
            events,
            vec![SurfaceEvent::DecPrivateMode { params: vec![25, 1], final_byte: b'l' }]
        );
        assert!(!screen.cursor_visible);
    }

    #[test]
    fn test_bell_outside_osc_only() {
        let mut screen = Screen::new(80, 24);
        let mut parser = VtParser::new();

        assert_eq!(feed(&mut parser, &mut screen, b"\x07"), vec![SurfaceEvent::Bell]);
        // BEL terminating an OSC title is not a bell
        assert!(feed(&mut parser, &mut screen, b"\x1b]0;title\x07").is_empty());
        assert!(feed(&mut parser, &mut screen, b"\x1b]0;title\x1b\\ok").is_empty());
        assert_eq!(screen.row_text(0), "ok");
    }

    #[test]
    fn test_utf8_split_across_writes() {
        let mut screen = Screen::new(10, 2);
        let mut parser = VtParser::new();
        let bytes = "é!".as_bytes();
        feed(&mut parser, &mut screen, &bytes[..1]);
        feed(&mut parser, &mut screen, &bytes[1..]);
        assert_eq!(screen.row_text(0), "é!");
    }

    #[test]
    fn test_text_and_newlines() {
        let mut screen = Screen::new(10, 3);
        let mut parser = VtParser::new();
        feed(&mut parser, &mut screen, b"login: \r\nroot\x08\x08\x1b[K");
        assert_eq!(screen.row_text(0), "login:");
        assert_eq!(screen.row_text(1), "ro");
    }
}
