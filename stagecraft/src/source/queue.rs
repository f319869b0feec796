//! Queue-backed source endpoints.

use super::Source;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct QueueShared<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

/// Closable FIFO shared between producers and any number of source endpoints.
///
/// Cloning is cheap and yields another handle onto the same queue.
pub struct SharedQueue<T> {
    shared: Arc<QueueShared<T>>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedQueue<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    closed: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Build a queue that already holds `items` and is closed.
    pub fn closed_with<I: IntoIterator<Item = T>>(items: I) -> Self {
        let queue = Self::new();
        {
            let mut state = queue.shared.state.lock();
            state.items.extend(items);
            state.closed = true;
        }
        queue
    }

    /// Append an item. Returns `false` (dropping the item) once closed.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        self.shared.ready.notify_one();
        true
    }

    /// Close the queue. Items already queued are still delivered.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a new source endpoint reading from this queue.
    pub fn source(&self) -> QueueSource<T> {
        QueueSource {
            queue: self.clone(),
            slot: None,
        }
    }
}

/// Source endpoint onto a [`SharedQueue`].
///
/// Each endpoint buffers at most one item in a private slot, so the
/// `is_closed` / `get` pair can never race with another endpoint draining the
/// same queue. Cloning creates a fresh endpoint with an empty slot.
pub struct QueueSource<T> {
    queue: SharedQueue<T>,
    slot: Option<T>,
}

impl<T> QueueSource<T> {
    pub fn queue(&self) -> &SharedQueue<T> {
        &self.queue
    }

    fn fill_from(slot: &mut Option<T>, state: &mut QueueState<T>) -> bool {
        if slot.is_none() {
            *slot = state.items.pop_front();
        }
        slot.is_some()
    }
}

impl<T> Clone for QueueSource<T> {
    fn clone(&self) -> Self {
        self.queue.source()
    }
}

impl<T> Source for QueueSource<T> {
    type Item = T;

    fn has_value(&mut self) -> bool {
        if self.slot.is_some() {
            return true;
        }
        let mut state = self.queue.shared.state.lock();
        Self::fill_from(&mut self.slot, &mut state)
    }

    fn wait(&mut self) {
        if self.slot.is_some() {
            return;
        }
        let mut state = self.queue.shared.state.lock();
        while !Self::fill_from(&mut self.slot, &mut state) && !state.closed {
            self.queue.shared.ready.wait(&mut state);
        }
    }

    fn is_closed(&mut self) -> bool {
        if self.slot.is_some() {
            return false;
        }
        let mut state = self.queue.shared.state.lock();
        !Self::fill_from(&mut self.slot, &mut state) && state.closed
    }

    fn get(&mut self) -> T {
        if let Some(item) = self.slot.take() {
            return item;
        }
        let mut state = self.queue.shared.state.lock();
        match state.items.pop_front() {
            Some(item) => item,
            None => panic!("QueueSource::get called with no value available"),
        }
    }
}

impl<T> Drop for QueueSource<T> {
    fn drop(&mut self) {
        // Hand an unconsumed item back so a sibling endpoint still sees it.
        if let Some(item) = self.slot.take() {
            let mut state = self.queue.shared.state.lock();
            state.items.push_front(item);
            self.queue.shared.ready.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn drain<T>(source: &mut QueueSource<T>) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            if !source.has_value() {
                source.wait();
            }
            if source.is_closed() {
                break;
            }
            out.push(source.get());
        }
        out
    }

    #[test]
    fn test_closed_queue_drains_in_order() {
        let queue = SharedQueue::closed_with(vec![1, 2, 3]);
        let mut source = queue.source();
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
        assert!(source.is_closed());
    }

    #[test]
    fn test_push_after_close_is_refused() {
        let queue = SharedQueue::new();
        assert!(queue.push(1));
        queue.close();
        assert!(!queue.push(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_is_closed_false_while_items_remain() {
        let queue = SharedQueue::closed_with(vec!["a"]);
        let mut source = queue.source();
        assert!(!source.is_closed());
        assert_eq!(source.get(), "a");
        assert!(source.is_closed());
    }

    #[test]
    fn test_wait_wakes_on_push() {
        let queue = SharedQueue::new();
        let mut source = queue.source();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(42);
                queue.close();
            })
        };

        assert_eq!(drain(&mut source), vec![42]);
        producer.join().unwrap();
    }

    #[test]
    fn test_dropped_endpoint_returns_buffered_item() {
        let queue = SharedQueue::closed_with(vec![7, 8]);
        let mut first = queue.source();
        assert!(first.has_value());
        drop(first);

        let mut second = queue.source();
        assert_eq!(drain(&mut second), vec![7, 8]);
    }

    #[test]
    fn test_endpoints_split_items() {
        let queue = SharedQueue::closed_with(0..100);
        let mut a = queue.source();
        let mut b = a.clone();

        let mut seen = drain(&mut a);
        seen.extend(drain(&mut b));
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
