use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;

use crate::bus::UnifiedBus;
use crate::config::InfraConfig;
use crate::error::InfraError;
use crate::logging::LoggerConfig;
use crate::policy::ThreadScheduler;
use crate::runtime::AsyncRuntime;
use crate::store::ConfigStore;

/// Owns the four subsystems and brings them up in order: logging sink,
/// async runtime, config store, bus. Teardown runs in reverse. Both
/// directions are idempotent, and `Drop` shuts down.
pub struct InfraService {
    runtime: AsyncRuntime,
    store: ConfigStore,
    bus: UnifiedBus,
    log_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    term_flag: Arc<AtomicBool>,
    started: bool,
}

impl InfraService {
    pub fn new() -> Self {
        Self {
            runtime: AsyncRuntime::new(),
            store: ConfigStore::new(),
            bus: UnifiedBus::new(),
            log_guard: None,
            term_flag: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }

    pub fn init(
        &mut self,
        cfg: &InfraConfig,
        scheduler: Option<Arc<dyn ThreadScheduler>>,
    ) -> Result<(), InfraError> {
        if self.started {
            return Ok(());
        }

        // 1) Logging first, so the rest can log during bring-up. Without a
        // logging section the environment variables stand in.
        let logging = cfg.logging.clone().unwrap_or_else(LoggerConfig::from_env);
        match logging.init() {
            Ok(guard) => self.log_guard = guard,
            Err(e) => {
                return Err(InfraError::ResourceUnavailable(format!("logging sink: {e}")));
            }
        }

        // 2) Runtime.
        self.runtime
            .init(scheduler, cfg.runtime.io_threads, cfg.runtime.cpu_threads);

        // 3) Hot-reloadable document (optional). The runtime stays up on
        // failure; the caller may decide to shut down.
        if let Some(path) = cfg.config_path.as_deref() {
            self.store.load(path)?;
        }

        // 4) The bus connects lazily; nothing to start here.

        if cfg.handle_term_signals {
            for sig in TERM_SIGNALS {
                let _ = flag::register(*sig, Arc::clone(&self.term_flag));
            }
        }

        self.started = true;
        tracing::info!("[InfraService] started");
        Ok(())
    }

    /// Tear down in reverse bring-up order. No-op on the second call.
    pub fn shutdown(&mut self) {
        if !self.started {
            return;
        }

        tracing::info!("[InfraService] stopping");
        self.bus.shutdown();
        self.runtime.stop();
        self.log_guard.take();

        self.started = false;
    }

    pub fn runtime(&self) -> &AsyncRuntime {
        &self.runtime
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn bus(&self) -> &UnifiedBus {
        &self.bus
    }

    /// True once a registered termination signal has been delivered.
    pub fn termination_requested(&self) -> bool {
        self.term_flag.load(Ordering::Relaxed)
    }
}

impl Default for InfraService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InfraService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
