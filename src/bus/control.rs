use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::InfraError;
use crate::throttled;
use crate::utils::StopFlag;

pub(crate) type ControlCallback = Arc<dyn Fn(&str) + Send + Sync>;

// Bounded receive timeout keeps the worker loops cooperatively cancellable.
const RECV_TIMEOUT_MS: i32 = 100;

struct SubWorker {
    stop: StopFlag,
    thread: Option<thread::JoinHandle<()>>,
}

/// ZeroMQ control plane.
///
/// The endpoint string is the topic: one lazily bound PUB socket per
/// published endpoint, one lazily connected SUB worker thread per subscribed
/// endpoint. Callbacks run on the worker thread in registration order.
pub(crate) struct ControlPlane {
    ctx: Mutex<Option<zmq::Context>>,
    publishers: Mutex<AHashMap<String, zmq::Socket>>,
    workers: Mutex<AHashMap<String, SubWorker>>,
    callbacks: Arc<Mutex<AHashMap<String, Vec<ControlCallback>>>>,
}

impl ControlPlane {
    pub(crate) fn new() -> Self {
        Self {
            ctx: Mutex::new(None),
            publishers: Mutex::new(AHashMap::new()),
            workers: Mutex::new(AHashMap::new()),
            callbacks: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    fn context(&self) -> zmq::Context {
        self.ctx.lock().get_or_insert_with(zmq::Context::new).clone()
    }

    /// Bind-on-first-publish, then send.
    pub(crate) fn publish(&self, endpoint: &str, message: &str) -> Result<(), InfraError> {
        let ctx = self.context();
        let mut publishers = self.publishers.lock();

        if !publishers.contains_key(endpoint) {
            let socket = ctx.socket(zmq::PUB)?;
            // Do not block teardown on undelivered messages.
            socket.set_linger(0)?;
            socket.bind(endpoint)?;
            publishers.insert(endpoint.to_owned(), socket);
        }

        if let Some(socket) = publishers.get(endpoint) {
            socket.send(message, 0)?;
        }
        Ok(())
    }

    /// Connect-on-first-subscribe; append the callback to the endpoint's
    /// dispatch list.
    pub(crate) fn subscribe(
        &self,
        endpoint: &str,
        callback: ControlCallback,
    ) -> Result<(), InfraError> {
        let ctx = self.context();

        {
            let mut workers = self.workers.lock();
            if !workers.contains_key(endpoint) {
                let socket = ctx.socket(zmq::SUB)?;
                socket.set_linger(0)?;
                socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;
                socket.connect(endpoint)?;
                // Receive everything published on this endpoint.
                socket.set_subscribe(b"")?;

                let stop = StopFlag::new();
                let loop_stop = stop.clone();
                let loop_callbacks = Arc::clone(&self.callbacks);
                let loop_endpoint = endpoint.to_owned();
                let thread = thread::spawn(move || {
                    receive_loop(&socket, &loop_stop, &loop_callbacks, &loop_endpoint);
                });

                workers.insert(
                    endpoint.to_owned(),
                    SubWorker {
                        stop,
                        thread: Some(thread),
                    },
                );
            }
        }

        self.callbacks
            .lock()
            .entry(endpoint.to_owned())
            .or_default()
            .push(callback);

        Ok(())
    }

    /// Two-phase teardown: flag every worker and take its join handle under
    /// the lock, join outside any bus lock, then drop sockets, context and
    /// tables. Idempotent.
    pub(crate) fn shutdown(&self) {
        let handles: Vec<thread::JoinHandle<()>> = {
            let mut workers = self.workers.lock();
            workers
                .values_mut()
                .filter_map(|worker| {
                    worker.stop.set();
                    worker.thread.take()
                })
                .collect()
        };

        for handle in handles {
            let _ = handle.join();
        }

        self.workers.lock().clear();
        self.publishers.lock().clear();
        self.ctx.lock().take();
        self.callbacks.lock().clear();
    }
}

fn receive_loop(
    socket: &zmq::Socket,
    stop: &StopFlag,
    callbacks: &Mutex<AHashMap<String, Vec<ControlCallback>>>,
    endpoint: &str,
) {
    while !stop.is_set() {
        let payload = match socket.recv_bytes(0) {
            Ok(bytes) => bytes,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                // Likely interrupted or shutting down; keep the worker alive.
                throttled!(
                    warn,
                    Duration::from_secs(5),
                    "[UnifiedBus] control receive error on {endpoint}: {e}"
                );
                continue;
            }
        };

        let message = String::from_utf8_lossy(&payload).into_owned();

        // Snapshot outside the lock so callbacks may re-enter the bus.
        let snapshot: Vec<ControlCallback> = {
            let map = callbacks.lock();
            map.get(endpoint).cloned().unwrap_or_default()
        };
        for cb in snapshot {
            cb(&message);
        }
    }
}
