//! PC speaker access for the terminal bell

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Something that can sound a tone
pub trait Speaker: Send + Sync {
    /// Request a tone. Must not block: it is called with the render lock held.
    fn tone(&self, frequency: u32, duration: Duration);
}

/// Speaker character device driven by ioctl(fd, 0, &frequency).
/// A frequency of 0 silences it.
pub struct PcSpeaker {
    device: File,
}

impl PcSpeaker {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { device })
    }

    #[cfg(unix)]
    pub fn set_frequency(&self, frequency: u32) -> io::Result<()> {
        use std::os::fd::AsRawFd;

        // SAFETY: the device is open and the argument outlives the call.
        let rc = unsafe { libc::ioctl(self.device.as_raw_fd(), 0 as _, &frequency as *const u32) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn set_frequency(&self, _frequency: u32) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "speaker ioctl requires unix"))
    }
}

#[derive(Clone, Copy, Debug)]
struct Beep {
    frequency: u32,
    duration: Duration,
}

/// Plays tones on a dedicated thread so `tone` never blocks the caller.
/// At most one tone waits behind the one playing; later bells are dropped.
pub struct BellWorker {
    tx: SyncSender<Beep>,
}

impl BellWorker {
    pub fn spawn(speaker: PcSpeaker) -> io::Result<Self> {
        Self::with_player(move |beep| {
            if let Err(e) = speaker.set_frequency(beep.frequency) {
                warn!("Speaker tone failed: {}", e);
                return;
            }
            thread::sleep(beep.duration);
            if let Err(e) = speaker.set_frequency(0) {
                warn!("Speaker silence failed: {}", e);
            }
        })
    }

    fn with_player<F>(mut play: F) -> io::Result<Self>
    where
        F: FnMut(Beep) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Beep>(1);
        thread::Builder::new().name("bell".into()).spawn(move || {
            for beep in rx {
                play(beep);
            }
        })?;
        Ok(Self { tx })
    }
}

impl Speaker for BellWorker {
    fn tone(&self, frequency: u32, duration: Duration) {
        match self.tx.try_send(Beep { frequency, duration }) {
            Ok(()) => debug!("Bell: {} Hz for {:?}", frequency, duration),
            Err(TrySendError::Full(_)) => debug!("Bell dropped, one already pending"),
            Err(TrySendError::Disconnected(_)) => warn!("Bell thread has exited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_bell_burst_keeps_one_pending() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let sink = Arc::clone(&played);
        let worker = BellWorker::with_player(move |beep| {
            let _ = started_tx.send(());
            // hold the first tone until the burst is over
            let _ = release_rx.recv();
            sink.lock().unwrap().push(beep);
        })
        .unwrap();

        worker.tone(1000, Duration::from_millis(100));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let start = Instant::now();
        for frequency in 1..=100 {
            worker.tone(frequency, Duration::from_millis(100));
        }
        assert!(start.elapsed() < Duration::from_secs(1), "tone blocked");

        drop(release_tx);
        drop(worker);
        let deadline = Instant::now() + Duration::from_secs(5);
        while played.lock().unwrap().len() < 2 {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));

        let played = played.lock().unwrap();
        let frequencies: Vec<u32> = played.iter().map(|beep| beep.frequency).collect();
        assert_eq!(frequencies, vec![1000, 1]);
    }
}
