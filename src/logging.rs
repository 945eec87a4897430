use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct LoggerConfig {
    /// Default level for targets without an override.
    pub level: String,

    /// Per-target level overrides (module path prefix → level). Targets
    /// without an entry stay at the default.
    #[serde(default)]
    pub targets: HashMap<String, String>,

    pub file_dir: Option<String>,
    pub file_prefix: Option<String>,

    /// Rotation period: "minutely", "hourly", anything else means daily.
    pub rolling: Option<String>,

    #[serde(default)]
    pub max_files: usize,
}

impl LoggerConfig {
    /// Loads logging configuration from environment variables.
    /// If a variable is not set, it will use a default value.
    /// Read variables are: LOG_LEVEL, LOG_FILE_DIR, LOG_FILE_PREFIX, LOG_ROLLING
    pub fn from_env() -> Self {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let file_dir = std::env::var("LOG_FILE_DIR").ok();
        let file_prefix = std::env::var("LOG_FILE_PREFIX").ok();
        let rolling = std::env::var("LOG_ROLLING").ok();

        Self {
            level,
            targets: HashMap::new(),
            file_dir,
            file_prefix,
            rolling,
            max_files: 2,
        }
    }

    /// Install the global subscriber: a rotating file sink when `file_dir`
    /// is set, stdout otherwise. The returned guard keeps the non-blocking
    /// writer alive and must be held for the process lifetime.
    pub fn init(&self) -> anyhow::Result<Option<WorkerGuard>> {
        let default_level = Level::from_str(&self.level).unwrap_or(Level::INFO);

        let mut filter = Targets::new().with_default(default_level);
        for (target, level) in &self.targets {
            let level = Level::from_str(level).unwrap_or(default_level);
            filter = filter.with_target(target.clone(), level);
        }

        if let Some(dir_str) = self.file_dir.as_deref() {
            let prefix = self.file_prefix.as_deref().unwrap_or("");

            let rotation = match self.rolling.as_deref() {
                Some("hourly") => Rotation::HOURLY,
                Some("minutely") => Rotation::MINUTELY,
                _ => Rotation::DAILY,
            };

            let appender: RollingFileAppender = RollingFileAppender::builder()
                .rotation(rotation)
                .max_log_files(self.max_files)
                .filename_prefix(prefix)
                .build(dir_str)
                .with_context(|| format!("failed to create rolling appender in {}", dir_str))?;

            let (nb, guard) = tracing_appender::non_blocking(appender);

            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(nb).with_ansi(false))
                .with(filter)
                .try_init();

            tracing::info!(
                "logging to dir: {}, prefix: {}, rotation: {:?}",
                dir_str,
                prefix,
                self.rolling
            );
            Ok(Some(guard))
        } else {
            let _ = tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer())
                .with(filter)
                .try_init();
            tracing::info!("logging to stdout (no file_dir)");
            Ok(None)
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            targets: HashMap::new(),
            file_dir: None,
            file_prefix: None,
            rolling: Some("daily".to_string()),
            max_files: 2,
        }
    }
}

/// Rate limiter for one logging call site.
///
/// Admits a single record per window; everything else is counted and the
/// count rides along on the next admitted record. Lock-free, so it can sit
/// on hot receive paths.
pub struct LogGate {
    window_ns: u64,
    origin: Instant,
    // Nanoseconds since `origin` of the last admitted record; 0 = none yet.
    last_emit: AtomicU64,
    dropped: AtomicU64,
}

impl LogGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ns: window.as_nanos() as u64,
            origin: Instant::now(),
            last_emit: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// `Some(dropped)` when the caller may emit, `None` while the window is
    /// still closed.
    pub fn admit(&self) -> Option<u64> {
        // Clamped to 1 so 0 stays reserved as the "never emitted" marker.
        let now = (self.origin.elapsed().as_nanos() as u64).max(1);

        let prev = self.last_emit.load(Ordering::Acquire);
        if prev != 0 && now.saturating_sub(prev) < self.window_ns {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self
            .last_emit
            .compare_exchange(prev, now, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => Some(self.dropped.swap(0, Ordering::Relaxed)),
            Err(_) => {
                // Another thread claimed this window.
                self.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

/// Emit a rate-limited `tracing` record: at most one per `$window` per call
/// site. When records were suppressed, the next admitted one carries a
/// `dropped` count.
///
///   throttled!(warn, Duration::from_secs(5), "recv failed: {e}");
#[macro_export]
macro_rules! throttled {
    ($level:ident, $window:expr, $($arg:tt)*) => {{
        static GATE: std::sync::OnceLock<$crate::logging::LogGate> = std::sync::OnceLock::new();
        match GATE.get_or_init(|| $crate::logging::LogGate::new($window)).admit() {
            Some(0) => tracing::$level!($($arg)*),
            Some(dropped) => tracing::$level!(dropped = dropped, $($arg)*),
            None => {}
        }
    }};
}
