use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::CachePadded;

/// Cheaply clonable cooperative stop signal shared between the runtime,
/// its worker pools and its critical loops.
/// Wraps an `AtomicBool` in `Arc<CachePadded<...>>` to avoid false sharing
/// on hot poll paths.
#[derive(Clone)]
#[repr(transparent)]
pub struct StopFlag(Arc<CachePadded<AtomicBool>>);

impl StopFlag {
    #[inline]
    pub fn new() -> Self {
        Self(Arc::new(CachePadded::new(AtomicBool::new(false))))
    }

    /// Check whether a stop has been requested (relaxed load).
    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Request a stop (relaxed store).
    #[inline(always)]
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    /// Re-arm the flag for a fresh lifecycle.
    #[inline(always)]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed)
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopFlag").field("set", &self.is_set()).finish()
    }
}
