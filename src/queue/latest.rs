use std::thread;
use std::time::Duration;

use crossbeam::utils::Backoff;
use parking_lot::Mutex;

use super::Queue;

/// Capacity-one queue where a new enqueue replaces any unread item.
///
/// The blocking dequeue is a cooperative poll: a strict wait-until-nonempty
/// is racy against overwriting producers, and a spuriously overwritten item
/// is acceptable by contract.
pub struct LatestQueue<T> {
    slot: Mutex<Option<T>>,
}

impl<T> LatestQueue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Default for LatestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Queue<T> for LatestQueue<T> {
    fn push(&self, item: T) {
        *self.slot.lock() = Some(item);
    }

    fn pop(&self) -> T {
        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        loop {
            if let Some(item) = self.slot.lock().take() {
                return item;
            }
            spins = spins.saturating_add(1);
            if spins < 64 {
                backoff.spin();
            } else if spins < 256 {
                backoff.snooze();
            } else {
                thread::sleep(Duration::from_micros(2));
            }
        }
    }

    fn try_pop(&self) -> Option<T> {
        self.slot.lock().take()
    }

    fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}
