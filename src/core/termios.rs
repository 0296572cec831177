//! Terminal settings consulted by the line discipline
//!
//! A typed subset of `struct termios`: the input and local flags the
//! discipline acts on, plus the control characters it reports.

use bitflags::bitflags;

bitflags! {
    /// Input mode flags (`c_iflag`)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InputFlags: u16 {
        const BRKINT  = 0b0000_0001;
        const IGNPAR  = 0b0000_0010;
        const ICRNL   = 0b0000_0100;
        const IGNCR   = 0b0000_1000;
        const INLCR   = 0b0001_0000;
        const IXON    = 0b0010_0000;
        const IMAXBEL = 0b0100_0000;
    }
}

bitflags! {
    /// Local mode flags (`c_lflag`)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LocalFlags: u16 {
        const ISIG    = 0b0000_0001;
        const ICANON  = 0b0000_0010;
        const ECHO    = 0b0000_0100;
        const ECHOE   = 0b0000_1000;
        const ECHOK   = 0b0001_0000;
        const ECHOCTL = 0b0010_0000;
        const ECHOKE  = 0b0100_0000;
    }
}

/// Control characters (`c_cc`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlChars {
    pub intr: u8,
    pub eof: u8,
    pub susp: u8,
}

impl Default for ControlChars {
    fn default() -> Self {
        Self {
            intr: ctrl(b'C'),
            eof: ctrl(b'D'),
            susp: ctrl(b'Z'),
        }
    }
}

/// Live terminal settings of one slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerminalConfig {
    pub iflag: InputFlags,
    pub lflag: LocalFlags,
    pub cc: ControlChars,
}

impl Default for TerminalConfig {
    /// The settings every pseudo-terminal is created with: a cooked,
    /// echoing terminal that maps CR to NL.
    fn default() -> Self {
        Self {
            iflag: InputFlags::BRKINT
                | InputFlags::IGNPAR
                | InputFlags::ICRNL
                | InputFlags::IXON
                | InputFlags::IMAXBEL,
            lflag: LocalFlags::ISIG
                | LocalFlags::ICANON
                | LocalFlags::ECHO
                | LocalFlags::ECHOE
                | LocalFlags::ECHOK
                | LocalFlags::ECHOCTL
                | LocalFlags::ECHOKE,
            cc: ControlChars::default(),
        }
    }
}

impl TerminalConfig {
    pub fn canonical(&self) -> bool {
        self.lflag.contains(LocalFlags::ICANON)
    }

    pub fn echo(&self) -> bool {
        self.lflag.contains(LocalFlags::ECHO)
    }
}

/// Control code of a letter, `CTRL('C') == 0x03`
pub const fn ctrl(letter: u8) -> u8 {
    letter & 0x1f
}

#[cfg(unix)]
const INPUT_MAP: [(InputFlags, libc::tcflag_t); 7] = [
    (InputFlags::BRKINT, libc::BRKINT),
    (InputFlags::IGNPAR, libc::IGNPAR),
    (InputFlags::ICRNL, libc::ICRNL),
    (InputFlags::IGNCR, libc::IGNCR),
    (InputFlags::INLCR, libc::INLCR),
    (InputFlags::IXON, libc::IXON),
    (InputFlags::IMAXBEL, libc::IMAXBEL),
];

#[cfg(unix)]
const LOCAL_MAP: [(LocalFlags, libc::tcflag_t); 7] = [
    (LocalFlags::ISIG, libc::ISIG),
    (LocalFlags::ICANON, libc::ICANON),
    (LocalFlags::ECHO, libc::ECHO),
    (LocalFlags::ECHOE, libc::ECHOE),
    (LocalFlags::ECHOK, libc::ECHOK),
    (LocalFlags::ECHOCTL, libc::ECHOCTL),
    (LocalFlags::ECHOKE, libc::ECHOKE),
];

#[cfg(unix)]
impl TerminalConfig {
    /// Extract the tracked settings from a kernel termios
    pub fn from_termios(t: &libc::termios) -> Self {
        let mut iflag = InputFlags::empty();
        for (flag, bit) in INPUT_MAP {
            if t.c_iflag & bit != 0 {
                iflag |= flag;
            }
        }
        let mut lflag = LocalFlags::empty();
        for (flag, bit) in LOCAL_MAP {
            if t.c_lflag & bit != 0 {
                lflag |= flag;
            }
        }
        Self {
            iflag,
            lflag,
            cc: ControlChars {
                intr: t.c_cc[libc::VINTR],
                eof: t.c_cc[libc::VEOF],
                susp: t.c_cc[libc::VSUSP],
            },
        }
    }

    /// Build the full termios a new pseudo-terminal is opened with
    pub fn to_termios(&self) -> libc::termios {
        // SAFETY: termios is plain old data; all-zero is a valid value.
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        for (flag, bit) in INPUT_MAP {
            if self.iflag.contains(flag) {
                t.c_iflag |= bit;
            }
        }
        for (flag, bit) in LOCAL_MAP {
            if self.lflag.contains(flag) {
                t.c_lflag |= bit;
            }
        }
        t.c_oflag = libc::OPOST | libc::ONLCR;
        t.c_cflag = libc::CS8 | libc::CREAD;
        t.c_cc[libc::VINTR] = self.cc.intr;
        t.c_cc[libc::VEOF] = self.cc.eof;
        t.c_cc[libc::VSUSP] = self.cc.susp;
        // SAFETY: `t` is a valid termios owned by this frame.
        unsafe {
            libc::cfsetispeed(&mut t, libc::B38400);
            libc::cfsetospeed(&mut t, libc::B38400);
        }
        t
    }
}
