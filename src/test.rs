#[cfg(test)]
mod tests {
    use crate::bus::{StreamMode, UnifiedBus};
    use crate::config::InfraConfig;
    use crate::policy::{ThreadClass, ThreadPolicy, ThreadScheduler};
    use crate::runtime::{AsyncRuntime, TimerOutcome};
    use crate::service::InfraService;
    use crate::store::ConfigStore;
    use crossbeam::channel as cbchan;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("edgelink-{}-{}", std::process::id(), name));
        p
    }

    // ---- helper: wait for a condition without an active spin
    fn eventually(dur: Duration, mut probe: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        loop {
            if probe() {
                return true;
            }
            if start.elapsed() > dur {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn timer_fires_on_pool_thread() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 1);

        let timer = rt.create_timer().expect("create_timer failed");
        let (tx, rx) = cbchan::unbounded::<TimerOutcome>();

        timer.expires_after(Duration::from_millis(10));
        timer.async_wait(move |outcome| {
            let _ = tx.send(outcome);
        });

        let outcome = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("timer never completed");
        assert_eq!(outcome, TimerOutcome::Elapsed);

        rt.stop();
    }

    #[test]
    fn timer_cancel_completes_with_cancelled() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 1);

        let timer = rt.create_timer().expect("create_timer failed");
        let (tx, rx) = cbchan::unbounded::<TimerOutcome>();

        timer.expires_after(Duration::from_secs(30));
        timer.async_wait(move |outcome| {
            let _ = tx.send(outcome);
        });
        timer.cancel();

        let outcome = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("cancel never completed the wait");
        assert_eq!(outcome, TimerOutcome::Cancelled);

        rt.stop();
    }

    #[test]
    fn timer_rearm_cancels_inflight_wait() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 1);

        let timer = rt.create_timer().expect("create_timer failed");
        let (tx, rx) = cbchan::unbounded::<TimerOutcome>();
        let tx2 = tx.clone();

        timer.expires_after(Duration::from_secs(30));
        timer.async_wait(move |outcome| {
            let _ = tx.send(outcome);
        });

        timer.expires_after(Duration::from_millis(5));
        timer.async_wait(move |outcome| {
            let _ = tx2.send(outcome);
        });

        let first = rx.recv_timeout(Duration::from_secs(1)).expect("no completion");
        let second = rx.recv_timeout(Duration::from_secs(1)).expect("no completion");
        assert_eq!(first, TimerOutcome::Cancelled);
        assert_eq!(second, TimerOutcome::Elapsed);

        rt.stop();
    }

    #[test]
    fn stop_cancels_pending_timers() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 1);

        let timer = rt.create_timer().expect("create_timer failed");
        let (tx, rx) = cbchan::unbounded::<TimerOutcome>();

        timer.expires_after(Duration::from_secs(60));
        timer.async_wait(move |outcome| {
            let _ = tx.send(outcome);
        });

        rt.stop();

        let outcome = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("pending wait was not cancelled by stop");
        assert_eq!(outcome, TimerOutcome::Cancelled);
    }

    #[test]
    fn strand_runs_tasks_in_post_order() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 4);

        let strand = rt.create_cpu_strand().expect("create_cpu_strand failed");
        let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
        let (done_tx, done_rx) = cbchan::bounded::<()>(1);

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            strand.post(move || {
                seen.lock().push(i);
            });
        }
        strand.post(move || {
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("strand sentinel never ran");

        let seen = seen.lock();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());

        rt.stop();
    }

    #[test]
    fn posts_reject_silently_when_not_running() {
        let rt = AsyncRuntime::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        rt.post_io(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });
        let h = Arc::clone(&hits);
        rt.post_cpu(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });
        assert!(rt.create_timer().is_err());
        assert!(rt.create_io_strand().is_err());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn runtime_restarts_after_stop() {
        let rt = AsyncRuntime::new();
        let hits = Arc::new(AtomicUsize::new(0));

        rt.init(None, 1, 1);
        let h = Arc::clone(&hits);
        rt.post_cpu(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });
        assert!(eventually(Duration::from_secs(1), || {
            hits.load(Ordering::Relaxed) == 1
        }));
        rt.stop();

        // Second cycle must behave like the first.
        rt.init(None, 1, 1);
        let h = Arc::clone(&hits);
        rt.post_io(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });
        assert!(eventually(Duration::from_secs(1), || {
            hits.load(Ordering::Relaxed) == 2
        }));
        rt.stop();
    }

    #[derive(Default)]
    struct RecordingScheduler {
        io_starts: AtomicUsize,
        cpu_starts: AtomicUsize,
        critical_starts: AtomicUsize,
        policies_applied: AtomicUsize,
    }

    impl ThreadScheduler for RecordingScheduler {
        fn on_thread_start(&self, class: ThreadClass, _index: usize) {
            let counter = match class {
                ThreadClass::Io => &self.io_starts,
                ThreadClass::Cpu => &self.cpu_starts,
                ThreadClass::Critical => &self.critical_starts,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        fn apply_current_thread_policy(&self, _policy: &ThreadPolicy) {
            self.policies_applied.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn scheduler_hook_sees_every_worker_thread() {
        let scheduler = Arc::new(RecordingScheduler::default());

        let rt = AsyncRuntime::new();
        rt.init(Some(scheduler.clone()), 2, 3);

        let (tx, rx) = cbchan::bounded::<()>(1);
        rt.spawn_critical_loop(ThreadPolicy::default(), move |stop| {
            let _ = tx.send(());
            while !stop.is_set() {
                thread::sleep(Duration::from_millis(1));
            }
        });
        rx.recv_timeout(Duration::from_secs(1))
            .expect("critical loop never entered");

        rt.stop();

        assert_eq!(scheduler.io_starts.load(Ordering::Relaxed), 2);
        assert_eq!(scheduler.cpu_starts.load(Ordering::Relaxed), 3);
        assert_eq!(scheduler.critical_starts.load(Ordering::Relaxed), 1);
        // The policy is applied from inside the critical thread itself.
        assert_eq!(scheduler.policies_applied.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn critical_loop_observes_stop_flag_and_is_joined() {
        let rt = AsyncRuntime::new();
        rt.init(None, 1, 1);

        let exited = Arc::new(AtomicBool::new(false));
        let exited2 = Arc::clone(&exited);
        rt.spawn_critical_loop(ThreadPolicy::default(), move |stop| {
            while !stop.is_set() {
                thread::sleep(Duration::from_millis(1));
            }
            exited2.store(true, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(20));
        rt.stop();

        // stop() joins critical threads, so the loop must have returned.
        assert!(exited.load(Ordering::Relaxed));
    }

    #[test]
    fn store_resolves_dotted_paths_from_disk() {
        let path = temp_path("store-basic.json");
        fs::write(
            &path,
            r#"{"ai":{"yolo":{"threshold":0.7,"enabled":true,"name":"v8"}},
               "port":5555,
               "cameras":[{"ip":"10.0.0.1"},{"ip":"10.0.0.2"}],
               "numbers":[1,2,3]}"#,
        )
        .expect("write fixture");

        let store = ConfigStore::new();
        store.load(&path).expect("load failed");

        assert_eq!(store.get("port", 0), 5555);
        assert!((store.get("ai.yolo.threshold", 0.0f64) - 0.7).abs() < 1e-9);
        assert_eq!(store.get("cameras.1.ip", String::new()), "10.0.0.2");
        assert_eq!(store.get("no.such.key", 123), 123);
        assert_eq!(store.get("ai.yolo.name", 456), 456);
        assert_eq!(store.get("numbers", Vec::<i64>::new()), vec![1, 2, 3]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn store_reload_notifies_listeners_and_swaps_tree() {
        let path = temp_path("store-reload.json");
        fs::write(&path, r#"{"x":1}"#).expect("write fixture");

        let store = ConfigStore::new();
        store.load(&path).expect("load failed");
        assert_eq!(store.get("x", 0), 1);

        let notified = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notified);
        store.register_listener("x", move || {
            n.fetch_add(1, Ordering::Relaxed);
        });

        fs::write(&path, r#"{"x":2}"#).expect("rewrite fixture");
        store.reload().expect("reload failed");

        assert!(notified.load(Ordering::Relaxed) >= 1);
        assert_eq!(store.get("x", 0), 2);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn store_load_reports_error_categories() {
        let store = ConfigStore::new();

        let missing = temp_path("store-missing.json");
        assert!(matches!(
            store.load(&missing),
            Err(crate::error::InfraError::ResourceUnavailable(_))
        ));

        let broken = temp_path("store-broken.json");
        fs::write(&broken, "{not json").expect("write fixture");
        assert!(matches!(
            store.load(&broken),
            Err(crate::error::InfraError::MalformedInput(_))
        ));
        let _ = fs::remove_file(&broken);
    }

    #[test]
    fn stream_broadcast_honors_both_disciplines() {
        let bus = UnifiedBus::new();

        let reliable = bus.subscribe_stream::<i32>("frames", StreamMode::ReliableFifo);
        let latest = bus.subscribe_stream::<i32>("frames", StreamMode::RealtimeLatest);

        bus.publish_stream("frames", Arc::new(1));
        bus.publish_stream("frames", Arc::new(2));

        assert_eq!(*reliable.recv(), 1);
        assert_eq!(*reliable.recv(), 2);
        assert!(reliable.is_empty());

        assert_eq!(*latest.recv(), 2);
        assert!(latest.is_empty());

        bus.shutdown();
    }

    #[test]
    fn stream_publish_is_zero_copy() {
        let bus = UnifiedBus::new();

        let reader_a = bus.subscribe_stream::<Vec<u8>>("blobs", StreamMode::ReliableFifo);
        let reader_b = bus.subscribe_stream::<Vec<u8>>("blobs", StreamMode::ReliableFifo);

        let frame = Arc::new(vec![0u8; 4096]);
        bus.publish_stream("blobs", Arc::clone(&frame));

        let got_a = reader_a.recv();
        let got_b = reader_b.recv();
        assert!(Arc::ptr_eq(&frame, &got_a));
        assert!(Arc::ptr_eq(&frame, &got_b));

        bus.shutdown();
    }

    #[test]
    fn stream_publish_without_subscribers_is_noop() {
        let bus = UnifiedBus::new();
        // Must not panic or leak: there is nothing to hand the frame to.
        bus.publish_stream("nobody-home", Arc::new(1u64));
        bus.shutdown();
    }

    #[test]
    fn control_plane_delivers_after_slow_joiner_warmup() {
        let bus = UnifiedBus::new();
        let endpoint = "inproc://edgelink-ctrl-test";

        // Bind side comes up on first publish; inproc requires bind first.
        bus.publish(endpoint, "warmup").expect("warmup publish failed");

        let seen = Arc::new(AtomicBool::new(false));
        let (msg_tx, msg_rx) = cbchan::unbounded::<String>();
        let gate = Arc::clone(&seen);
        bus.subscribe(endpoint, move |msg| {
            // First-delivery gate: record "hello" exactly once.
            if msg == "hello" && !gate.swap(true, Ordering::Relaxed) {
                let _ = msg_tx.send(msg.to_owned());
            }
        })
        .expect("subscribe failed");

        // The transport drops messages sent before the subscriber finished
        // connecting, so retry until one lands.
        let deadline = Instant::now() + Duration::from_secs(2);
        while !seen.load(Ordering::Relaxed) && Instant::now() < deadline {
            bus.publish(endpoint, "hello").expect("publish failed");
            thread::sleep(Duration::from_millis(10));
        }

        let delivered = msg_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("subscriber never observed the message");
        assert_eq!(delivered, "hello");
        assert!(msg_rx.try_recv().is_err());

        bus.shutdown();
    }

    #[test]
    fn control_callbacks_run_in_registration_order() {
        let bus = UnifiedBus::new();
        let endpoint = "inproc://edgelink-ctrl-order";

        bus.publish(endpoint, "warmup").expect("warmup publish failed");

        let order = Arc::new(Mutex::new(Vec::<u8>::new()));
        let fired = Arc::new(AtomicBool::new(false));

        let o = Arc::clone(&order);
        bus.subscribe(endpoint, move |_| {
            o.lock().push(1);
        })
        .expect("subscribe failed");

        let o = Arc::clone(&order);
        let f = Arc::clone(&fired);
        bus.subscribe(endpoint, move |_| {
            o.lock().push(2);
            f.store(true, Ordering::Relaxed);
        })
        .expect("subscribe failed");

        let deadline = Instant::now() + Duration::from_secs(2);
        while !fired.load(Ordering::Relaxed) && Instant::now() < deadline {
            bus.publish(endpoint, "ping").expect("publish failed");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(fired.load(Ordering::Relaxed));

        bus.shutdown();

        let order = order.lock();
        assert!(!order.is_empty());
        // Within one delivered message the callbacks fire in registration
        // order, so every 2 is immediately preceded by a 1.
        for (i, v) in order.iter().enumerate() {
            if *v == 2 {
                assert!(i > 0 && order[i - 1] == 1);
            }
        }
    }

    #[test]
    fn bus_shutdown_is_idempotent() {
        let bus = UnifiedBus::new();
        let endpoint = "inproc://edgelink-ctrl-shutdown";

        bus.publish(endpoint, "warmup").expect("publish failed");
        bus.subscribe(endpoint, |_| {}).expect("subscribe failed");

        bus.shutdown();
        bus.shutdown();
    }

    #[test]
    fn infra_config_loads_from_file() {
        let path = temp_path("infra-config.json");
        fs::write(
            &path,
            r#"{"runtime":{"io_threads":1,"cpu_threads":2},
               "logging":{"level":"debug"},
               "handle_term_signals":false}"#,
        )
        .expect("write fixture");

        let cfg = InfraConfig::from_file(&path).expect("parse failed");
        assert_eq!(cfg.runtime.io_threads, 1);
        assert_eq!(cfg.runtime.cpu_threads, 2);
        let logging = cfg.logging.expect("logging section missing");
        assert_eq!(logging.level, "debug");
        assert!(cfg.config_path.is_none());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn service_brings_up_and_tears_down_in_order() {
        let doc = temp_path("service-doc.json");
        fs::write(&doc, r#"{"port":7777}"#).expect("write fixture");

        // No logging section: the service falls back to LoggerConfig::from_env.
        let cfg = InfraConfig {
            config_path: Some(doc.to_string_lossy().into_owned()),
            ..InfraConfig::default()
        };

        let mut svc = InfraService::new();
        svc.init(&cfg, None).expect("init failed");
        // Second init is a no-op.
        svc.init(&cfg, None).expect("re-init failed");

        assert_eq!(svc.store().get("port", 0), 7777);
        assert!(!svc.termination_requested());

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        svc.runtime().post_io(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });
        assert!(eventually(Duration::from_secs(1), || {
            hits.load(Ordering::Relaxed) == 1
        }));

        svc.shutdown();
        svc.shutdown();

        let _ = fs::remove_file(&doc);
    }
}
