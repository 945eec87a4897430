use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::pool::{Job, PoolHandle};

/// Serializing executor over a multi-threaded pool.
///
/// Work posted to one strand runs in FIFO order and never concurrently with
/// other work on the same strand: at most one pool job per strand is in
/// flight at any moment, and it re-schedules itself while the backlog is
/// non-empty.
#[derive(Clone)]
pub struct Strand {
    inner: Arc<StrandInner>,
}

struct StrandInner {
    pending: Mutex<StrandQueue>,
    pool: PoolHandle,
}

struct StrandQueue {
    jobs: VecDeque<Job>,
    active: bool,
}

impl Strand {
    pub(crate) fn new(pool: PoolHandle) -> Self {
        Self {
            inner: Arc::new(StrandInner {
                pending: Mutex::new(StrandQueue {
                    jobs: VecDeque::new(),
                    active: false,
                }),
                pool,
            }),
        }
    }

    /// Queue a unit of work behind everything already posted to this strand.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        let kick = {
            let mut q = self.inner.pending.lock();
            q.jobs.push_back(Box::new(f));
            if q.active {
                false
            } else {
                q.active = true;
                true
            }
        };
        if kick {
            StrandInner::schedule(Arc::clone(&self.inner));
        }
    }
}

impl StrandInner {
    fn schedule(inner: Arc<StrandInner>) {
        let pool = inner.pool.clone();
        pool.submit(Box::new(move || StrandInner::run_one(inner)));
    }

    fn run_one(inner: Arc<StrandInner>) {
        let job = inner.pending.lock().jobs.pop_front();
        if let Some(job) = job {
            job();
        }

        let again = {
            let mut q = inner.pending.lock();
            if q.jobs.is_empty() {
                q.active = false;
                false
            } else {
                true
            }
        };
        if again {
            StrandInner::schedule(inner);
        }
    }
}
