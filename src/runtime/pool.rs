use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel as cbchan;

use crate::policy::{ThreadClass, ThreadScheduler};
use crate::utils::StopFlag;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

const IDLE_RECV_TIMEOUT: Duration = Duration::from_millis(50);

/// Fixed-size pool of worker threads draining a shared job channel.
///
/// Submission stays open for the pool's whole lifetime; `shutdown` flips the
/// stop flag, lets every worker drain what is already queued, and joins them.
pub(crate) struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Clonable submission half of a pool. Strands and the timer service hold
/// clones, so it rejects work on its own once the pool is stopping.
#[derive(Clone)]
pub(crate) struct PoolHandle {
    tx: cbchan::Sender<Job>,
    stop: StopFlag,
}

impl PoolHandle {
    pub(crate) fn submit(&self, job: Job) {
        if self.stop.is_set() {
            return;
        }
        let _ = self.tx.try_send(job);
    }
}

impl WorkerPool {
    pub(crate) fn start(
        class: ThreadClass,
        workers_n: usize,
        scheduler: Option<Arc<dyn ThreadScheduler>>,
    ) -> Self {
        let (tx, rx) = cbchan::unbounded::<Job>();
        let stop = StopFlag::new();

        let workers = (0..workers_n)
            .map(|i| {
                let rx = rx.clone();
                let stop = stop.clone();
                let scheduler = scheduler.clone();
                thread::spawn(move || {
                    if let Some(s) = scheduler.as_deref() {
                        s.on_thread_start(class, i);
                    }
                    worker_loop(&rx, &stop);
                })
            })
            .collect();

        Self {
            handle: PoolHandle { tx, stop },
            workers,
        }
    }

    pub(crate) fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Signal drain-and-exit and join every worker.
    pub(crate) fn shutdown(self) {
        self.handle.stop.set();
        drop(self.handle);
        for w in self.workers {
            let _ = w.join();
        }
    }
}

fn worker_loop(rx: &cbchan::Receiver<Job>, stop: &StopFlag) {
    loop {
        match rx.recv_timeout(IDLE_RECV_TIMEOUT) {
            Ok(job) => job(),
            Err(cbchan::RecvTimeoutError::Timeout) => {
                if stop.is_set() {
                    while let Ok(job) = rx.try_recv() {
                        job();
                    }
                    return;
                }
            }
            Err(cbchan::RecvTimeoutError::Disconnected) => return,
        }
    }
}
