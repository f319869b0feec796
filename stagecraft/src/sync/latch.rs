//! One-shot countdown latch.

use parking_lot::{Condvar, Mutex};

/// Countdown gate: N parties count down, any number of waiters block until
/// the count reaches zero. Once open it stays open.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    opened: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            opened: Condvar::new(),
        }
    }

    /// Count down by one. Extra count-downs on an open latch are ignored.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.opened.notify_all();
        }
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.opened.wait(&mut remaining);
        }
    }

    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }

    pub fn is_open(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_count_is_open() {
        let latch = CompletionLatch::new(0);
        assert!(latch.is_open());
        latch.wait();
    }

    #[test]
    fn test_count_down_saturates() {
        let latch = CompletionLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_waiter_blocks_while_closed() {
        let latch = Arc::new(CompletionLatch::new(1));
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                latch.wait();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        latch.count_down();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }

    #[test]
    fn test_waiters_released_by_last_count_down() {
        let latch = Arc::new(CompletionLatch::new(3));
        let (tx, rx) = mpsc::channel();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let tx = tx.clone();
                thread::spawn(move || {
                    latch.wait();
                    tx.send(()).unwrap();
                })
            })
            .collect();

        for _ in 0..3 {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.count_down()).join().unwrap();
        }

        for _ in 0..4 {
            assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        }
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
