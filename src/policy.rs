use core_affinity::{CoreId, get_core_ids, set_for_current};
use serde::{Deserialize, Serialize};

/// Scheduling preferences for a dedicated thread.
///
/// A passive descriptor; interpretation belongs to the installed
/// [`ThreadScheduler`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ThreadPolicy {
    /// Logical CPU to pin to (`None` = no preference).
    pub cpu_id: Option<usize>,

    /// Realtime priority to request (`None` = do not change).
    /// For Linux SCHED_FIFO the usable range is platform dependent.
    pub realtime_priority: Option<i32>,

    /// Whether to attempt realtime scheduling at all.
    #[serde(default)]
    pub realtime: bool,
}

/// Worker classification reported to the scheduler hook on thread entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadClass {
    Io,
    Cpu,
    Critical,
}

/// Optional platform hook for thread affinity and priority control.
///
/// Pass `None` into the runtime's `init` to disable all affinity and
/// priority management.
pub trait ThreadScheduler: Send + Sync {
    /// Called at the beginning of each worker thread, inside the thread.
    fn on_thread_start(&self, class: ThreadClass, index: usize);

    /// Called from within a critical-loop thread to apply its policy.
    fn apply_current_thread_policy(&self, policy: &ThreadPolicy);
}

/// Default hook for platforms where plain CPU pinning is all that is
/// available. Honors `cpu_id`; realtime requests are logged and skipped.
#[derive(Debug, Default)]
pub struct CorePinScheduler;

impl ThreadScheduler for CorePinScheduler {
    fn on_thread_start(&self, class: ThreadClass, index: usize) {
        tracing::debug!("[CorePinScheduler] thread start: {:?} #{}", class, index);
    }

    fn apply_current_thread_policy(&self, policy: &ThreadPolicy) {
        if let Some(core_id) = policy.cpu_id {
            match try_pin_core(core_id) {
                Ok(core_id) => {
                    tracing::info!("[CorePinScheduler] pinned to core: {}", core_id);
                }
                Err(e) => {
                    tracing::error!("[CorePinScheduler] cannot pin core: {}", e);
                }
            }
        }

        if policy.realtime {
            tracing::warn!(
                "[CorePinScheduler] realtime scheduling requested (priority {:?}) but not managed on this platform",
                policy.realtime_priority
            );
        }
    }
}

pub fn try_pin_core(core_id: usize) -> anyhow::Result<usize> {
    if let Some(core_ids) = get_core_ids() {
        if core_ids.len() > core_id && set_for_current(CoreId { id: core_id }) {
            return Ok(core_id);
        }
    }
    Err(anyhow::anyhow!("failed to pin core"))
}
