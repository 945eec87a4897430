use std::path::Path;

use anyhow::Context;
use config::{Config, File};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logging::LoggerConfig;

/// Read a typed options struct from a config file; the format is picked by
/// the file extension.
pub fn load_cfg<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();

    Config::builder()
        .add_source(File::from(path))
        .build()
        .and_then(|cfg| cfg.try_deserialize::<T>())
        .with_context(|| format!("startup config {} is unusable", path.display()))
}

/// Worker-pool sizing. Zero CPU workers means "use the hardware concurrency";
/// zero I/O workers is raised to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOptions {
    #[serde(default = "default_io_threads")]
    pub io_threads: usize,

    #[serde(default)]
    pub cpu_threads: usize,
}

fn default_io_threads() -> usize {
    2
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            cpu_threads: 0,
        }
    }
}

/// Top-level bring-up options for the infrastructure service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Logging sink options. `None` falls back to the environment
    /// (LOG_LEVEL, LOG_FILE_DIR, LOG_FILE_PREFIX, LOG_ROLLING).
    #[serde(default)]
    pub logging: Option<LoggerConfig>,

    #[serde(default)]
    pub runtime: RuntimeOptions,

    /// Hot-reloadable document loaded into the config store
    /// (`None` = skip loading).
    pub config_path: Option<String>,

    /// Register TERM-signal handlers feeding `termination_requested`.
    #[serde(default)]
    pub handle_term_signals: bool,
}

impl InfraConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        load_cfg(path)
    }
}
