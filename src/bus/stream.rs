use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::queue::{FifoQueue, LatestQueue, Queue};

/// Type-erased payload reference crossing the data plane.
pub type FramePayload = Arc<dyn Any + Send + Sync>;

/// Delivery discipline of one subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Unbounded FIFO; nothing is dropped.
    ReliableFifo,
    /// Capacity one; the newest frame replaces an unread one.
    RealtimeLatest,
}

struct StreamTopic {
    queues: Mutex<Vec<Arc<dyn Queue<FramePayload>>>>,
}

/// Per-topic fan-out of type-erased frames into subscriber queues.
///
/// A topic record is created on first subscribe and lives until the bus
/// shuts down; subscriber queues stay in the fan-out list even after the
/// consumer handle is gone.
pub(crate) struct StreamRegistry {
    topics: Mutex<AHashMap<String, Arc<StreamTopic>>>,
}

impl StreamRegistry {
    pub(crate) fn new() -> Self {
        Self {
            topics: Mutex::new(AHashMap::new()),
        }
    }

    pub(crate) fn publish(&self, topic: &str, frame: FramePayload) {
        let record = {
            let topics = self.topics.lock();
            match topics.get(topic) {
                Some(record) => Arc::clone(record),
                // Nobody ever subscribed: nothing to hand the frame to.
                None => return,
            }
        };

        let queues = record.queues.lock();
        for queue in queues.iter() {
            queue.push(Arc::clone(&frame));
        }
    }

    pub(crate) fn subscribe(
        &self,
        topic: &str,
        mode: StreamMode,
    ) -> Arc<dyn Queue<FramePayload>> {
        let record = {
            let mut topics = self.topics.lock();
            Arc::clone(topics.entry(topic.to_owned()).or_insert_with(|| {
                Arc::new(StreamTopic {
                    queues: Mutex::new(Vec::new()),
                })
            }))
        };

        let queue: Arc<dyn Queue<FramePayload>> = match mode {
            StreamMode::ReliableFifo => Arc::new(FifoQueue::new()),
            StreamMode::RealtimeLatest => Arc::new(LatestQueue::new()),
        };
        record.queues.lock().push(Arc::clone(&queue));
        queue
    }

    pub(crate) fn clear(&self) {
        self.topics.lock().clear();
    }
}

/// Consumer-facing typed handle over an erased subscriber queue.
///
/// The bus stores frames opaquely; the reader downcasts at the edge. A topic
/// must carry one element type across all producers and consumers — frames
/// failing the downcast are discarded.
pub struct StreamReader<T> {
    queue: Arc<dyn Queue<FramePayload>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> StreamReader<T> {
    pub(crate) fn new(queue: Arc<dyn Queue<FramePayload>>) -> Self {
        Self {
            queue,
            _marker: PhantomData,
        }
    }

    /// Blocking dequeue of the next frame.
    pub fn recv(&self) -> Arc<T> {
        loop {
            match self.queue.pop().downcast::<T>() {
                Ok(frame) => return frame,
                Err(_) => {
                    tracing::debug!("[UnifiedBus] dropped frame with unexpected element type");
                }
            }
        }
    }

    /// Non-blocking dequeue.
    pub fn try_recv(&self) -> Option<Arc<T>> {
        self.queue.try_pop()?.downcast::<T>().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
