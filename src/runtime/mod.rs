mod pool;
mod strand;
mod timer;

pub use strand::Strand;
pub use timer::{Timer, TimerOutcome};

use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::error::InfraError;
use crate::policy::{ThreadClass, ThreadPolicy, ThreadScheduler};
use crate::utils::StopFlag;

use pool::{PoolHandle, WorkerPool};
use timer::TimerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeState {
    Uninit,
    Running,
    Stopping,
    Stopped,
}

/// Dual-pool execution runtime: an I/O-biased and a CPU-biased worker pool,
/// one-shot timers, serializing strands, and dedicated critical loops.
///
/// Lifecycle transitions run under one mutex; the steady-state submission
/// path goes through lock-free snapshot handles so `post_io`/`post_cpu`
/// never contend with the joins in [`stop`](Self::stop).
pub struct AsyncRuntime {
    lifecycle: Mutex<Lifecycle>,
    handles: ArcSwapOption<Handles>,
    stop_flag: StopFlag,
}

struct Lifecycle {
    state: RuntimeState,
    scheduler: Option<Arc<dyn ThreadScheduler>>,
    io: Option<WorkerPool>,
    cpu: Option<WorkerPool>,
    timers: Option<TimerService>,
    critical: Vec<thread::JoinHandle<()>>,
}

struct Handles {
    io: PoolHandle,
    cpu: PoolHandle,
}

impl AsyncRuntime {
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle {
                state: RuntimeState::Uninit,
                scheduler: None,
                io: None,
                cpu: None,
                timers: None,
                critical: Vec::new(),
            }),
            handles: ArcSwapOption::empty(),
            stop_flag: StopFlag::new(),
        }
    }

    /// Start both worker pools. `io_n == 0` is raised to 1; `cpu_n == 0`
    /// defaults to the hardware concurrency. No-op while already running.
    pub fn init(
        &self,
        scheduler: Option<Arc<dyn ThreadScheduler>>,
        io_n: usize,
        cpu_n: usize,
    ) {
        let io_n = io_n.max(1);
        let cpu_n = if cpu_n == 0 {
            hardware_concurrency()
        } else {
            cpu_n
        };

        let mut lc = self.lifecycle.lock();
        match lc.state {
            RuntimeState::Running | RuntimeState::Stopping => return,
            RuntimeState::Uninit | RuntimeState::Stopped => {}
        }

        self.stop_flag.clear();
        lc.scheduler = scheduler;

        let io = WorkerPool::start(ThreadClass::Io, io_n, lc.scheduler.clone());
        let cpu = WorkerPool::start(ThreadClass::Cpu, cpu_n, lc.scheduler.clone());
        let timers = TimerService::start(io.handle());

        self.handles.store(Some(Arc::new(Handles {
            io: io.handle(),
            cpu: cpu.handle(),
        })));
        lc.io = Some(io);
        lc.cpu = Some(cpu);
        lc.timers = Some(timers);
        lc.state = RuntimeState::Running;

        tracing::info!(
            "[AsyncRuntime] started: {} io worker(s), {} cpu worker(s)",
            io_n,
            cpu_n
        );
    }

    /// Queue a unit of work on the I/O pool. Silently rejected unless running.
    pub fn post_io(&self, f: impl FnOnce() + Send + 'static) {
        if let Some(h) = self.handles.load_full() {
            h.io.submit(Box::new(f));
        }
    }

    /// Queue a unit of work on the CPU pool. Silently rejected unless running.
    pub fn post_cpu(&self, f: impl FnOnce() + Send + 'static) {
        if let Some(h) = self.handles.load_full() {
            h.cpu.submit(Box::new(f));
        }
    }

    /// One-shot timer bound to the I/O pool.
    pub fn create_timer(&self) -> Result<Timer, InfraError> {
        let lc = self.lifecycle.lock();
        match (&lc.timers, lc.state) {
            (Some(t), RuntimeState::Running) => Ok(t.timer()),
            _ => Err(InfraError::InvalidState("create_timer before init")),
        }
    }

    /// Serializing executor bound to the I/O pool.
    pub fn create_io_strand(&self) -> Result<Strand, InfraError> {
        match self.handles.load_full() {
            Some(h) => Ok(Strand::new(h.io.clone())),
            None => Err(InfraError::InvalidState("create_io_strand before init")),
        }
    }

    /// Serializing executor bound to the CPU pool.
    pub fn create_cpu_strand(&self) -> Result<Strand, InfraError> {
        match self.handles.load_full() {
            Some(h) => Ok(Strand::new(h.cpu.clone())),
            None => Err(InfraError::InvalidState("create_cpu_strand before init")),
        }
    }

    /// Spawn a dedicated loop thread outside both pools.
    ///
    /// Inside the new thread the scheduler hook (if any) is notified and the
    /// policy applied, then `f` runs with the runtime's shared stop flag.
    /// The callee owns its loop shape and must poll the flag. Dropped with
    /// an error log when the runtime is not running.
    pub fn spawn_critical_loop(
        &self,
        policy: ThreadPolicy,
        f: impl FnOnce(StopFlag) + Send + 'static,
    ) {
        let mut lc = self.lifecycle.lock();
        if lc.state != RuntimeState::Running {
            tracing::error!("[AsyncRuntime] spawn_critical_loop while not running; dropped");
            return;
        }

        let index = lc.critical.len();
        let scheduler = lc.scheduler.clone();
        let stop = self.stop_flag.clone();
        lc.critical.push(thread::spawn(move || {
            if let Some(s) = scheduler.as_deref() {
                s.on_thread_start(ThreadClass::Critical, index);
                s.apply_current_thread_policy(&policy);
            }
            f(stop);
        }));
    }

    /// The shared stop flag critical loops poll.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Stop accepting work, cancel pending timers, drain both pools and join
    /// every thread. Safe to call repeatedly; `init` may run again afterwards.
    pub fn stop(&self) {
        let (io, cpu, timers, critical) = {
            let mut lc = self.lifecycle.lock();
            if lc.state != RuntimeState::Running {
                return;
            }
            lc.state = RuntimeState::Stopping;
            self.stop_flag.set();
            self.handles.store(None);
            (
                lc.io.take(),
                lc.cpu.take(),
                lc.timers.take(),
                std::mem::take(&mut lc.critical),
            )
        };

        // Joins happen outside the lifecycle lock. The timer service goes
        // first so pending waits complete `Cancelled` into the draining
        // I/O pool.
        if let Some(t) = timers {
            t.shutdown();
        }
        if let Some(p) = io {
            p.shutdown();
        }
        if let Some(p) = cpu {
            p.shutdown();
        }
        for t in critical {
            let _ = t.join();
        }

        let mut lc = self.lifecycle.lock();
        lc.scheduler = None;
        lc.state = RuntimeState::Stopped;
        tracing::info!("[AsyncRuntime] stopped");
    }
}

impl Default for AsyncRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AsyncRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn hardware_concurrency() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
