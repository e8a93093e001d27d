//! Public API for embedding the module host

pub use crate::host::config::{HostConfig, DEFAULT_CONFIG_ROOT, DEFAULT_LOG_MESSAGE_LIMIT};
pub use crate::host::error::{HostError, HostResult};
pub use crate::host::events::{LifecycleEvent, ModuleFaulted, ModuleLoaded, ModuleUnloaded};
pub use crate::host::logger::{LogFacadeSink, LogSink, Severity, MODULE_LOG_TARGET};
pub use crate::host::manager::{factory, HostBuilder, ModuleFactory, ModuleHost, ModuleStatus};
pub use crate::host::report::{FailureReason, LifecycleFailure, LoadReport, ShutdownReport};
pub use crate::host::state::HostState;
