//! Journal module
//!
//! Keeps a bounded, in-memory record of host activity: lifecycle events,
//! heartbeats, and free-form entries other modules add through the
//! [`Journal`] capability. Entries added through the capability are
//! attributed to the calling module.

use crate::config::api::ConfigValue;
use crate::context::api::{CallerContext, ModuleId};
use crate::core::sync::{read_recover, write_recover};
use crate::core::version::get_api_version;
use crate::host::api::{LifecycleEvent, Severity};
use crate::messaging::api::Handler;
use crate::module::api::{
    CapabilitySet, HandleSlot, Module, ModuleError, ModuleHandle, ModuleInfo, ModuleResult,
};
use crate::module::builtin::heartbeat::Heartbeat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub const JOURNAL_MODULE: &str = "journal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    /// Oldest entries are dropped beyond this many
    pub capacity: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub at: DateTime<Utc>,
    /// Module the entry is attributed to; `None` for host activity
    pub source: Option<ModuleId>,
    pub text: String,
}

/// Read and append access to the journal
pub trait Journal: Send + Sync {
    /// Append an entry attributed to the current caller.
    fn record(&self, text: &str);

    /// Entries, oldest first
    fn entries(&self) -> Vec<JournalEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Heartbeats observed since the journal started
    fn heartbeats(&self) -> u64;
}

crate::capability!(dyn Journal);

struct JournalStore {
    capacity: RwLock<usize>,
    entries: RwLock<VecDeque<JournalEntry>>,
    heartbeats: AtomicU64,
}

impl JournalStore {
    fn new() -> Self {
        Self {
            capacity: RwLock::new(JournalConfig::default().capacity),
            entries: RwLock::new(VecDeque::new()),
            heartbeats: AtomicU64::new(0),
        }
    }

    fn push(&self, source: Option<ModuleId>, text: impl Into<String>) {
        let capacity = *read_recover(&self.capacity, "journal capacity");
        let mut entries = write_recover(&self.entries, "journal entries");
        entries.push_back(JournalEntry {
            at: Utc::now(),
            source,
            text: text.into(),
        });
        while entries.len() > capacity {
            entries.pop_front();
        }
    }

    fn set_capacity(&self, capacity: usize) {
        *write_recover(&self.capacity, "journal capacity") = capacity;
        let mut entries = write_recover(&self.entries, "journal entries");
        while entries.len() > capacity {
            entries.pop_front();
        }
    }
}

impl Journal for JournalStore {
    fn record(&self, text: &str) {
        self.push(CallerContext::current(), text);
    }

    fn entries(&self) -> Vec<JournalEntry> {
        read_recover(&self.entries, "journal entries")
            .iter()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        read_recover(&self.entries, "journal entries").len()
    }

    fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }
}

pub struct JournalModule {
    handle: HandleSlot,
    store: Arc<JournalStore>,
}

impl JournalModule {
    pub fn new() -> Self {
        Self {
            handle: HandleSlot::new(),
            store: Arc::new(JournalStore::new()),
        }
    }

    /// The journal this module publishes
    pub fn journal(&self) -> Arc<dyn Journal> {
        Arc::clone(&self.store) as Arc<dyn Journal>
    }

    fn subscribe(&self, handle: &ModuleHandle) -> ModuleResult<()> {
        let store = Arc::clone(&self.store);
        handle.subscribe(
            Handler::<dyn LifecycleEvent>::from_fn(move |event| {
                store.push(None, event.describe());
                Ok(())
            }),
            None,
        )?;

        let store = Arc::clone(&self.store);
        handle.subscribe(
            Handler::<Heartbeat>::from_fn(move |heartbeat| {
                store.heartbeats.fetch_add(1, Ordering::Relaxed);
                store.push(
                    Some(heartbeat.source.clone()),
                    format!("heartbeat #{}", heartbeat.sequence),
                );
                Ok(())
            }),
            None,
        )?;
        Ok(())
    }
}

impl Default for JournalModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Module for JournalModule {
    fn module_info(&self) -> ModuleInfo {
        ModuleInfo::new(JOURNAL_MODULE, env!("CARGO_PKG_VERSION"), get_api_version())
            .with_description("Records lifecycle events and heartbeats")
    }

    fn attach(&self, handle: ModuleHandle) {
        self.handle.set(handle);
    }

    fn publish(self: Arc<Self>, capabilities: &mut CapabilitySet) {
        capabilities.provide::<dyn Journal>(self.journal());
    }

    fn configuration_section(&self) -> bool {
        true
    }

    fn apply_configuration(&self, configuration: ConfigValue) -> ModuleResult<()> {
        let config: JournalConfig = serde_json::from_value(configuration)
            .map_err(|e| ModuleError::failed(format!("invalid journal configuration: {e}")))?;
        if config.capacity == 0 {
            return Err(ModuleError::failed("journal capacity must be at least 1"));
        }
        self.store.set_capacity(config.capacity);
        Ok(())
    }

    async fn initialize(&self) -> ModuleResult<()> {
        let handle = self.handle.get()?;
        self.subscribe(handle)?;
        self.store.push(Some(handle.id().clone()), "journal started");
        Ok(())
    }

    async fn uninitialize(&self) -> ModuleResult<()> {
        let handle = self.handle.get()?;
        handle.log(
            format!(
                "Journal closed with {} entries, {} heartbeats",
                self.store.len(),
                self.store.heartbeats()
            ),
            Severity::Debug,
        );
        Ok(())
    }
}

fn create() -> Arc<dyn Module> {
    Arc::new(JournalModule::new())
}

crate::builtin_module!(create);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capacity_drops_oldest() {
        let store = JournalStore::new();
        store.set_capacity(2);
        store.push(None, "one");
        store.push(None, "two");
        store.push(None, "three");

        let texts: Vec<_> = store.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn test_record_is_attributed_to_caller() {
        let store = JournalStore::new();
        CallerContext::sync_scope(Some(ModuleId::new("alpha")), || store.record("hello"));
        store.record("anonymous");

        let entries = store.entries();
        assert_eq!(entries[0].source, Some(ModuleId::new("alpha")));
        assert_eq!(entries[1].source, None);
    }

    #[test]
    fn test_configuration_validation() {
        let module = JournalModule::new();
        assert!(module.apply_configuration(json!({ "capacity": 0 })).is_err());
        module.apply_configuration(json!({ "capacity": 8 })).unwrap();
        assert_eq!(*read_recover(&module.store.capacity, "test"), 8);
    }
}
