//! Configuration store contract and the in-memory store

use crate::config::error::{ConfigError, ConfigResult};
use crate::core::sync::{read_lock, write_lock};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Opaque configuration blob stored per key
pub type ConfigValue = serde_json::Value;

/// Keyed hierarchical storage consumed by the host
///
/// Keys are `(root, sub, name)`. Writing `None` deletes the key; deleting a
/// missing key is not an error.
pub trait ConfigStore: Send + Sync {
    fn get(&self, root: &str, sub: &str, name: &str) -> ConfigResult<Option<ConfigValue>>;

    fn set(&self, root: &str, sub: &str, name: &str, value: Option<ConfigValue>)
        -> ConfigResult<()>;
}

type Key = (String, String, String);

fn key(root: &str, sub: &str, name: &str) -> Key {
    (root.to_string(), sub.to_string(), name.to_string())
}

fn poisoned(message: String) -> ConfigError {
    ConfigError::Poisoned { message }
}

/// Thread-safe in-memory store, used by tests and embedders without persistence
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<Key, ConfigValue>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.read().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, root: &str, sub: &str, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let values = read_lock(&self.values, "memory config store", poisoned)?;
        Ok(values.get(&key(root, sub, name)).cloned())
    }

    fn set(
        &self,
        root: &str,
        sub: &str,
        name: &str,
        value: Option<ConfigValue>,
    ) -> ConfigResult<()> {
        let mut values = write_lock(&self.values, "memory config store", poisoned)?;
        match value {
            Some(value) => {
                values.insert(key(root, sub, name), value);
            }
            None => {
                values.remove(&key(root, sub, name));
            }
        }
        Ok(())
    }
}
