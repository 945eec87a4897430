use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::pool::PoolHandle;

/// Completion status handed to a timer's wait callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Elapsed,
    Cancelled,
}

type WaitFn = Box<dyn FnOnce(TimerOutcome) + Send + 'static>;

/// One-shot timer bound to the I/O pool.
///
/// `expires_after` arms a relative deadline; re-arming before the timer
/// fires cancels an in-flight wait. `async_wait` registers the completion
/// callback, which runs on pool threads. A wait registered with no armed
/// deadline completes immediately with [`TimerOutcome::Elapsed`].
pub struct Timer {
    shared: Arc<TimerShared>,
    svc: Arc<TimerInner>,
}

struct TimerShared {
    state: Mutex<TimerState>,
}

struct TimerState {
    deadline: Option<Instant>,
    waiter: Option<WaitFn>,
    // Bumped on every re-arm/cancel; stale heap entries are skipped.
    epoch: u64,
}

impl Timer {
    /// Arm a relative deadline. Any in-flight wait completes `Cancelled`.
    pub fn expires_after(&self, timeout: Duration) {
        let cancelled = {
            let mut st = self.shared.state.lock();
            st.epoch += 1;
            st.deadline = Some(Instant::now() + timeout);
            st.waiter.take()
        };
        if let Some(cb) = cancelled {
            self.svc
                .pool
                .submit(Box::new(move || cb(TimerOutcome::Cancelled)));
        }
    }

    /// Register the completion callback for the armed deadline.
    pub fn async_wait(&self, callback: impl FnOnce(TimerOutcome) + Send + 'static) {
        let mut immediate: Option<WaitFn> = None;
        let mut entry: Option<TimerEntry> = None;

        let replaced = {
            let mut st = self.shared.state.lock();
            let replaced = st.waiter.take();
            match st.deadline {
                None => immediate = Some(Box::new(callback)),
                Some(at) => {
                    st.waiter = Some(Box::new(callback));
                    entry = Some(TimerEntry {
                        at,
                        epoch: st.epoch,
                        shared: Arc::clone(&self.shared),
                    });
                }
            }
            replaced
        };

        if let Some(cb) = replaced {
            self.svc
                .pool
                .submit(Box::new(move || cb(TimerOutcome::Cancelled)));
        }
        if let Some(cb) = immediate {
            self.svc
                .pool
                .submit(Box::new(move || cb(TimerOutcome::Elapsed)));
        }
        if let Some(entry) = entry {
            self.svc.schedule(entry);
        }
    }

    /// Complete any pending wait with `Cancelled`.
    pub fn cancel(&self) {
        let cancelled = {
            let mut st = self.shared.state.lock();
            st.epoch += 1;
            st.waiter.take()
        };
        if let Some(cb) = cancelled {
            self.svc
                .pool
                .submit(Box::new(move || cb(TimerOutcome::Cancelled)));
        }
    }
}

struct TimerEntry {
    at: Instant,
    epoch: u64,
    shared: Arc<TimerShared>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.epoch == other.epoch
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so the earliest deadline sits on top of the max-heap.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.at.cmp(&self.at)
    }
}

/// Deadline thread shared by every timer of a runtime instance.
pub(crate) struct TimerService {
    inner: Arc<TimerInner>,
    thread: Option<thread::JoinHandle<()>>,
}

struct TimerInner {
    pending: Mutex<PendingQueue>,
    wakeup: Condvar,
    pool: PoolHandle,
}

struct PendingQueue {
    heap: BinaryHeap<TimerEntry>,
    stopping: bool,
}

impl TimerInner {
    fn schedule(&self, entry: TimerEntry) {
        let mut q = self.pending.lock();
        if q.stopping {
            drop(q);
            fire(&self.pool, entry, TimerOutcome::Cancelled);
            return;
        }
        q.heap.push(entry);
        self.wakeup.notify_one();
    }
}

impl TimerService {
    pub(crate) fn start(pool: PoolHandle) -> Self {
        let inner = Arc::new(TimerInner {
            pending: Mutex::new(PendingQueue {
                heap: BinaryHeap::new(),
                stopping: false,
            }),
            wakeup: Condvar::new(),
            pool,
        });

        let run = Arc::clone(&inner);
        let thread = thread::spawn(move || deadline_loop(&run));

        Self {
            inner,
            thread: Some(thread),
        }
    }

    pub(crate) fn timer(&self) -> Timer {
        Timer {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    deadline: None,
                    waiter: None,
                    epoch: 0,
                }),
            }),
            svc: Arc::clone(&self.inner),
        }
    }

    /// Complete everything pending as `Cancelled` and join the deadline thread.
    pub(crate) fn shutdown(mut self) {
        {
            let mut q = self.inner.pending.lock();
            q.stopping = true;
            self.inner.wakeup.notify_one();
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

fn fire(pool: &PoolHandle, entry: TimerEntry, outcome: TimerOutcome) {
    let cb = {
        let mut st = entry.shared.state.lock();
        if st.epoch == entry.epoch {
            st.waiter.take()
        } else {
            None
        }
    };
    if let Some(cb) = cb {
        pool.submit(Box::new(move || cb(outcome)));
    }
}

fn deadline_loop(inner: &TimerInner) {
    let mut q = inner.pending.lock();
    loop {
        if q.stopping {
            let drained: Vec<_> = q.heap.drain().collect();
            drop(q);
            for entry in drained {
                fire(&inner.pool, entry, TimerOutcome::Cancelled);
            }
            return;
        }

        let now = Instant::now();
        let mut due = Vec::new();
        while q.heap.peek().is_some_and(|top| top.at <= now) {
            if let Some(entry) = q.heap.pop() {
                due.push(entry);
            }
        }

        if !due.is_empty() {
            // Completions are posted outside the heap lock.
            drop(q);
            for entry in due {
                fire(&inner.pool, entry, TimerOutcome::Elapsed);
            }
            q = inner.pending.lock();
            continue;
        }

        match q.heap.peek().map(|e| e.at) {
            Some(at) => {
                let _ = inner.wakeup.wait_until(&mut q, at);
            }
            None => inner.wakeup.wait(&mut q),
        }
    }
}
