mod fifo;
mod latest;

pub use fifo::FifoQueue;
pub use latest::LatestQueue;

/// Contract shared by both queue disciplines.
///
/// All operations are non-panicking and safe for many producers and many
/// consumers; synchronization is internal.
pub trait Queue<T>: Send + Sync {
    /// Non-blocking enqueue.
    fn push(&self, item: T);

    /// Blocking dequeue. Suspends the caller until an item is available.
    fn pop(&self) -> T;

    /// Non-blocking dequeue. Never spuriously fails.
    fn try_pop(&self) -> Option<T>;

    /// Emptiness probe, consistent with the visible state at the moment of call.
    fn is_empty(&self) -> bool;
}
