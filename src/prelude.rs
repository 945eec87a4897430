pub use crate::bus::{FramePayload, StreamMode, StreamReader, UnifiedBus};
pub use crate::config::{InfraConfig, RuntimeOptions, load_cfg};
pub use crate::error::InfraError;
pub use crate::logging::LoggerConfig;
pub use crate::policy::{CorePinScheduler, ThreadClass, ThreadPolicy, ThreadScheduler};
pub use crate::queue::{FifoQueue, LatestQueue, Queue};
pub use crate::runtime::{AsyncRuntime, Strand, Timer, TimerOutcome};
pub use crate::service::InfraService;
pub use crate::store::{ConfigStore, FromValue};
pub use crate::utils::StopFlag;
