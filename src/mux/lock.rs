//! The render lock
//!
//! One lock serializes every surface mutation and focus change. Critical
//! sections are short (one surface write or one switch), so waiters spin
//! and yield their timeslice between attempts instead of parking.

use spin::mutex::SpinMutex;
use spin::relax::Yield;

pub type RenderLock<T> = SpinMutex<T, Yield>;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_lock_serializes_writers() {
        let lock = Arc::new(RenderLock::new(Vec::new()));
        let handles: Vec<_> = (0..4u8)
            .map(|id| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut log = lock.lock();
                        // a write is never interleaved with another
                        log.push(id);
                        log.push(id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let log = lock.lock();
        assert_eq!(log.len(), 800);
        assert!(log.chunks(2).all(|pair| pair[0] == pair[1]));
    }
}
