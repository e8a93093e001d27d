//! Public API for configuration storage

pub use crate::config::error::{ConfigError, ConfigResult};
pub use crate::config::store::{ConfigStore, ConfigValue, MemoryConfigStore};
pub use crate::config::toml_store::TomlConfigStore;
