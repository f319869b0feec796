//! Lock-free fan-in counter.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Integer counter with an atomic decrement-and-test.
///
/// Used to converge the completions of N parallel drivers into one signal:
/// every driver calls [`decrement`](Self::decrement) once, and only the caller
/// that observes the transition to zero gets `0` back.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicUsize,
}

impl AtomicCounter {
    pub fn new(value: usize) -> Self {
        Self {
            value: AtomicUsize::new(value),
        }
    }

    /// Reset the counter before a new fan-out.
    pub fn init(&self, value: usize) {
        self.value.store(value, Ordering::Release);
    }

    /// Decrement by one and return the remaining count.
    ///
    /// Saturates at zero: decrementing an already-zero counter returns
    /// `None` instead of wrapping, so a surplus arrival can never be mistaken
    /// for the final one.
    pub fn decrement(&self) -> Option<usize> {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Decrement and report whether this call reached zero.
    pub fn decrement_and_test(&self) -> bool {
        self.decrement() == Some(0)
    }

    pub fn load(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_decrement_reports_remaining() {
        let counter = AtomicCounter::new(2);
        assert_eq!(counter.decrement(), Some(1));
        assert_eq!(counter.decrement(), Some(0));
        assert_eq!(counter.decrement(), None);
        assert_eq!(counter.load(), 0);
    }

    #[test]
    fn test_init_resets() {
        let counter = AtomicCounter::default();
        counter.init(3);
        assert_eq!(counter.load(), 3);
    }

    #[test]
    fn test_exactly_one_thread_observes_zero() {
        const THREADS: usize = 16;
        let counter = Arc::new(AtomicCounter::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || counter.decrement_and_test())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|hit_zero| *hit_zero)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(counter.load(), 0);
    }
}
