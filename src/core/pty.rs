//! Pseudo-terminal wrapper for Unix
//!
//! Each virtual terminal owns one master/slave pair. The master is the
//! console's read/write endpoint; the slave becomes the standard streams
//! and controlling terminal of the session spawned on first focus.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use thiserror::Error;

use super::termios::TerminalConfig;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to create pseudo terminal: {0}")]
    Open(#[source] io::Error),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to fetch terminal attributes: {0}")]
    Attributes(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Window geometry reported to the session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
    pub xpixel: u16,
    pub ypixel: u16,
}

/// The program started in each virtual terminal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Value of `TERM` in the session's environment
    pub term: String,
}

/// The console side of a pseudo-terminal
pub trait PtyPort: Send + Sync + 'static {
    /// Write bytes to the session's input
    fn write_input(&self, data: &[u8]) -> Result<()>;

    /// Blocking read of the session's output
    fn read_output(&self, buffer: &mut [u8]) -> Result<usize>;

    /// Current settings of the slave side
    fn terminal_config(&self) -> Result<TerminalConfig>;

    /// Start the session with the slave as its controlling terminal.
    /// Returns the process id.
    fn spawn_session(&self, command: &SessionCommand) -> Result<u32>;
}

#[cfg(unix)]
pub use self::unix::UnixPty;

#[cfg(unix)]
mod unix {
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    use super::*;

    /// openpty(3) pair. The slave stays open for the process lifetime so
    /// master reads block, rather than fail, while no session is attached.
    pub struct UnixPty {
        master: File,
        slave: OwnedFd,
    }

    impl UnixPty {
        pub fn open(config: &TerminalConfig, size: WindowSize) -> Result<Self> {
            let mut termios = config.to_termios();
            let mut winsize = libc::winsize {
                ws_row: size.rows,
                ws_col: size.cols,
                ws_xpixel: size.xpixel,
                ws_ypixel: size.ypixel,
            };
            let mut master: libc::c_int = -1;
            let mut slave: libc::c_int = -1;

            // SAFETY: all pointers refer to live locals; a null name is allowed.
            let rc = unsafe {
                libc::openpty(
                    &mut master,
                    &mut slave,
                    std::ptr::null_mut(),
                    &mut termios,
                    &mut winsize,
                )
            };
            if rc == -1 {
                return Err(PtyError::Open(io::Error::last_os_error()));
            }

            // SAFETY: openpty succeeded, both descriptors are fresh and owned here.
            let (master, slave) =
                unsafe { (File::from_raw_fd(master), OwnedFd::from_raw_fd(slave)) };

            // Sessions get their own slave as stdio; every other slot's pair
            // must close on exec.
            set_cloexec(master.as_raw_fd()).map_err(PtyError::Open)?;
            set_cloexec(slave.as_raw_fd()).map_err(PtyError::Open)?;
            Ok(Self { master, slave })
        }
    }

    fn set_cloexec(fd: libc::c_int) -> io::Result<()> {
        // SAFETY: fd is owned by the caller and open.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    impl PtyPort for UnixPty {
        fn write_input(&self, data: &[u8]) -> Result<()> {
            (&self.master).write_all(data).map_err(PtyError::Write)
        }

        fn read_output(&self, buffer: &mut [u8]) -> Result<usize> {
            (&self.master).read(buffer).map_err(PtyError::Read)
        }

        fn terminal_config(&self) -> Result<TerminalConfig> {
            // SAFETY: termios is plain old data, filled in by tcgetattr.
            let mut termios: libc::termios = unsafe { std::mem::zeroed() };
            // SAFETY: the master descriptor is open for the lifetime of self.
            if unsafe { libc::tcgetattr(self.master.as_raw_fd(), &mut termios) } == -1 {
                return Err(PtyError::Attributes(io::Error::last_os_error()));
            }
            Ok(TerminalConfig::from_termios(&termios))
        }

        fn spawn_session(&self, command: &SessionCommand) -> Result<u32> {
            let spawn_err = |source: io::Error| PtyError::Spawn {
                program: command.program.display().to_string(),
                source,
            };
            let stdio = || self.slave.try_clone().map(Stdio::from).map_err(spawn_err);

            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args)
                .env("TERM", &command.term)
                .stdin(stdio()?)
                .stdout(stdio()?)
                .stderr(stdio()?);

            // SAFETY: only async-signal-safe calls between fork and exec.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }

            // The child is never reaped; dropping the handle leaves it running.
            let child = cmd.spawn().map_err(spawn_err)?;
            Ok(child.id())
        }
    }

}
