//! Heartbeat module
//!
//! Publishes a [`Heartbeat`] message at a fixed interval from a background
//! task that stops when the module's cancellation signal is asserted. The
//! sequence number survives restarts through the `sequence` parameter.
//!
//! ```toml
//! [modhost."modules/heartbeat"]
//! configuration = { interval_ms = 5000 }
//! ```

use crate::config::api::ConfigValue;
use crate::context::api::{CallerContext, ModuleId};
use crate::core::sync::{lock_mutex, read_recover, write_recover};
use crate::core::version::get_api_version;
use crate::host::api::Severity;
use crate::module::api::{HandleSlot, Module, ModuleError, ModuleHandle, ModuleInfo, ModuleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const HEARTBEAT_MODULE: &str = "heartbeat";

const SEQUENCE_PARAMETER: &str = "sequence";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

/// Periodic liveness message
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub source: ModuleId,
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
}

crate::message!(Heartbeat);

struct HeartbeatState {
    handle: HandleSlot,
    config: RwLock<HeartbeatConfig>,
    sequence: AtomicU64,
}

impl HeartbeatState {
    fn interval(&self) -> Duration {
        Duration::from_millis(read_recover(&self.config, "heartbeat config").interval_ms)
    }
}

pub struct HeartbeatModule {
    state: Arc<HeartbeatState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatModule {
    pub fn new() -> Self {
        Self {
            state: Arc::new(HeartbeatState {
                handle: HandleSlot::new(),
                config: RwLock::new(HeartbeatConfig::default()),
                sequence: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Number of heartbeats emitted so far, including earlier runs
    pub fn sequence(&self) -> u64 {
        self.state.sequence.load(Ordering::SeqCst)
    }

    fn task_slot(&self) -> ModuleResult<std::sync::MutexGuard<'_, Option<JoinHandle<()>>>> {
        lock_mutex(&self.task, "heartbeat task", ModuleError::failed)
    }
}

impl Default for HeartbeatModule {
    fn default() -> Self {
        Self::new()
    }
}

async fn beat(state: Arc<HeartbeatState>) {
    let Ok(handle) = state.handle.get() else {
        return;
    };
    let cancellation = handle.cancellation().clone();
    let interval = state.interval();

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let sequence = state.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let heartbeat = Heartbeat {
            source: handle.id().clone(),
            sequence,
            emitted_at: Utc::now(),
        };
        match handle.send(heartbeat).await {
            Ok(report) => log::trace!("Heartbeat {}: {}", sequence, report),
            Err(e) => {
                log::debug!("Heartbeat loop stopping: {}", e);
                break;
            }
        }
    }
}

fn persist_sequence(handle: &ModuleHandle, sequence: u64) {
    if let Err(e) = handle.set_parameter(SEQUENCE_PARAMETER, Some(&sequence)) {
        handle.log_error(&e, true);
    }
}

#[async_trait::async_trait]
impl Module for HeartbeatModule {
    fn module_info(&self) -> ModuleInfo {
        ModuleInfo::new(HEARTBEAT_MODULE, env!("CARGO_PKG_VERSION"), get_api_version())
            .with_description("Publishes periodic heartbeat messages")
    }

    fn attach(&self, handle: ModuleHandle) {
        self.state.handle.set(handle);
    }

    fn configuration_section(&self) -> bool {
        true
    }

    fn apply_configuration(&self, configuration: ConfigValue) -> ModuleResult<()> {
        let config: HeartbeatConfig = serde_json::from_value(configuration)
            .map_err(|e| ModuleError::failed(format!("invalid heartbeat configuration: {e}")))?;
        if config.interval_ms == 0 {
            return Err(ModuleError::failed("heartbeat interval_ms must be greater than zero"));
        }
        *write_recover(&self.state.config, "heartbeat config") = config;
        Ok(())
    }

    async fn initialize(&self) -> ModuleResult<()> {
        let handle = self.state.handle.get()?;
        let resumed = handle.get_parameter::<u64>(SEQUENCE_PARAMETER)?.unwrap_or(0);
        self.state.sequence.store(resumed, Ordering::SeqCst);
        handle.log(
            format!(
                "Heartbeat every {:?}, resuming at sequence {}",
                self.state.interval(),
                resumed
            ),
            Severity::Debug,
        );
        Ok(())
    }

    async fn post_initialize(&self) -> ModuleResult<()> {
        let task = CallerContext::spawn(beat(Arc::clone(&self.state)));
        *self.task_slot()? = Some(task);
        Ok(())
    }

    async fn uninitialize(&self) -> ModuleResult<()> {
        let handle = self.state.handle.get()?;
        handle.cancellation().cancel();

        let task = self.task_slot()?.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                handle.log(format!("Heartbeat task ended abnormally: {e}"), Severity::Warning);
            }
        }

        persist_sequence(handle, self.sequence());
        Ok(())
    }
}

fn create() -> Arc<dyn Module> {
    Arc::new(HeartbeatModule::new())
}

crate::builtin_module!(create);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_configuration() {
        let module = HeartbeatModule::new();
        module
            .apply_configuration(json!({ "interval_ms": 250 }))
            .unwrap();
        assert_eq!(module.state.interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let module = HeartbeatModule::new();
        assert!(module.apply_configuration(json!({ "interval_ms": 0 })).is_err());
        assert!(module.apply_configuration(json!({ "period": 10 })).is_err());
        assert_eq!(module.state.interval(), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn test_initialize_without_handle_fails() {
        let module = HeartbeatModule::new();
        assert!(matches!(
            module.initialize().await,
            Err(ModuleError::NotAttached)
        ));
    }
}
