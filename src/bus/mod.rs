mod control;
mod stream;

pub use stream::{FramePayload, StreamMode, StreamReader};

use std::any::Any;
use std::sync::Arc;

use crate::error::InfraError;

use control::ControlPlane;
use stream::StreamRegistry;

/// Unified publish/subscribe surface multiplexing two transports.
///
/// The *control plane* carries small string messages over ZeroMQ PUB/SUB —
/// the endpoint string is the topic, and the bus passes it to
/// `bind`/`connect` unparsed. The *data plane* hands large payloads to
/// in-process typed subscriber queues without copying: the payload crosses
/// the bus as a shared reference, so every subscriber of a topic observes
/// the same allocation.
pub struct UnifiedBus {
    control: ControlPlane,
    streams: StreamRegistry,
}

impl UnifiedBus {
    pub fn new() -> Self {
        Self {
            control: ControlPlane::new(),
            streams: StreamRegistry::new(),
        }
    }

    /// Publish a control message. Lazily creates the transport context and
    /// the endpoint's PUB socket (bind side).
    pub fn publish(&self, endpoint: &str, message: &str) -> Result<(), InfraError> {
        self.control.publish(endpoint, message)
    }

    /// Subscribe to control messages on `endpoint`. Lazily spawns the
    /// endpoint's receiver worker (connect side); `callback` runs on that
    /// worker thread and must not block — offload to the runtime instead.
    ///
    /// Messages racing a fresh subscription can be dropped by the transport
    /// (slow joiner); callers needing first-message delivery should warm up
    /// or retry.
    pub fn subscribe(
        &self,
        endpoint: &str,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Result<(), InfraError> {
        self.control.subscribe(endpoint, Arc::new(callback))
    }

    /// Hand a payload to every subscriber of `topic` without copying it.
    /// A topic nobody ever subscribed to drops the payload silently.
    pub fn publish_stream<T: Any + Send + Sync>(&self, topic: &str, frame: Arc<T>) {
        self.streams.publish(topic, frame);
    }

    /// Subscribe to a data-plane topic with the chosen queue discipline.
    /// The returned reader drains a queue that stays in the topic's fan-out
    /// list until bus shutdown.
    pub fn subscribe_stream<T: Any + Send + Sync>(
        &self,
        topic: &str,
        mode: StreamMode,
    ) -> StreamReader<T> {
        StreamReader::new(self.streams.subscribe(topic, mode))
    }

    /// Deterministic teardown of both planes: stop and join every receiver
    /// worker, close all sockets, drop the transport context, clear the
    /// topic and callback tables. Idempotent.
    pub fn shutdown(&self) {
        self.control.shutdown();
        self.streams.clear();
    }
}

impl Default for UnifiedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnifiedBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}
