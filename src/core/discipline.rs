//! Line discipline
//!
//! Cooks keyboard bytes the way a kernel tty would before they reach the
//! session: newline translation, canonical line editing and echo. The
//! settings come from the focused slot's pseudo-terminal on every read, so
//! a session switching to raw mode takes effect on the next keystroke.

use super::termios::{InputFlags, TerminalConfig};

/// Capacity of the canonical line buffer
pub const LINE_CAPACITY: usize = 1024;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const BS: u8 = 0x08;

/// Erases one rendered column
const ERASE: &[u8] = b"\x08 \x08";

/// Where cooked input goes
pub trait LinePort {
    /// Deliver bytes to the session (pseudo-terminal input)
    fn send(&mut self, bytes: &[u8]);
    /// Show bytes on the focused display
    fn echo(&mut self, bytes: &[u8]);
}

/// Bounded line buffer; bytes past capacity are dropped
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(LINE_CAPACITY),
        }
    }

    /// Append a byte, returns false if the buffer is full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.buf.len() == LINE_CAPACITY {
            return false;
        }
        self.buf.push(byte);
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.buf.pop()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Apply the CR/NL input translations. `None` means the byte is dropped.
pub fn translate_newline(byte: u8, iflag: InputFlags) -> Option<u8> {
    let icrnl = iflag.contains(InputFlags::ICRNL);
    let inlcr = iflag.contains(InputFlags::INLCR);
    match byte {
        CR if iflag.contains(InputFlags::IGNCR) => None,
        CR if icrnl => Some(LF),
        LF if !icrnl => Some(CR),
        CR if !inlcr => Some(LF),
        LF if inlcr => Some(CR),
        b => Some(b),
    }
}

fn is_control(byte: u8) -> bool {
    (0x01..=0x1f).contains(&byte)
}

/// Canonical/raw input processing shared by all virtual terminals
#[derive(Debug, Default)]
pub struct LineDiscipline {
    line: LineBuffer,
}

impl LineDiscipline {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn line(&self) -> &LineBuffer {
        &self.line
    }

    pub fn feed_all<P: LinePort>(
        &mut self,
        bytes: &[u8],
        config: &TerminalConfig,
        echo: bool,
        port: &mut P,
    ) {
        for &b in bytes {
            self.feed(b, config, echo, port);
        }
    }

    /// Process one input byte
    pub fn feed<P: LinePort>(
        &mut self,
        byte: u8,
        config: &TerminalConfig,
        echo: bool,
        port: &mut P,
    ) {
        let Some(c) = translate_newline(byte, config.iflag) else {
            return;
        };
        let echo = echo && config.echo();

        if !config.canonical() {
            port.send(&[c]);
        } else {
            match c {
                LF => {
                    self.line.push(c);
                    if echo {
                        port.echo(b"\n");
                    }
                    port.send(self.line.as_bytes());
                    self.line.clear();
                    return;
                }
                BS => {
                    if let Some(erased) = self.line.pop() {
                        if echo {
                            let columns = if is_control(erased) { 2 } else { 1 };
                            for _ in 0..columns {
                                port.echo(ERASE);
                            }
                        }
                    }
                    return;
                }
                _ => {
                    if !self.line.push(c) {
                        return;
                    }
                }
            }
        }

        if echo {
            if (0x20..=0x7e).contains(&c) {
                port.echo(&[c]);
            } else if is_control(c) {
                port.echo(&[b'^', c + 0x40]);
            }
        }
    }
}
