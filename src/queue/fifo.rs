use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::Queue;

/// Unbounded multi-producer multi-consumer FIFO.
///
/// Preserves every item in enqueue order; the blocking dequeue suspends on a
/// condition until an item arrives.
pub struct FifoQueue<T> {
    inner: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Queue<T> for FifoQueue<T> {
    fn push(&self, item: T) {
        self.inner.lock().push_back(item);
        self.available.notify_one();
    }

    fn pop(&self) -> T {
        let mut guard = self.inner.lock();
        loop {
            if let Some(item) = guard.pop_front() {
                return item;
            }
            self.available.wait(&mut guard);
        }
    }

    fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
