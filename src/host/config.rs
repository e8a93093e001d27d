//! Host settings
//!
//! Read from the `[host]` table of the modhost configuration file:
//!
//! ```toml
//! [host]
//! config_root = "modhost"
//! initialize_timeout_ms = 30000
//! post_initialize_timeout_ms = 30000
//! uninitialize_timeout_ms = 10000
//! log_message_limit = 30000
//! ```

use crate::host::error::{HostError, HostResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_ROOT: &str = "modhost";
pub const DEFAULT_LOG_MESSAGE_LIMIT: usize = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Root path under which module configuration and parameters are stored
    pub config_root: String,
    pub initialize_timeout_ms: u64,
    pub post_initialize_timeout_ms: u64,
    pub uninitialize_timeout_ms: u64,
    /// Longest module log message, in characters, before it is split
    pub log_message_limit: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            config_root: DEFAULT_CONFIG_ROOT.to_string(),
            initialize_timeout_ms: 30_000,
            post_initialize_timeout_ms: 30_000,
            uninitialize_timeout_ms: 10_000,
            log_message_limit: DEFAULT_LOG_MESSAGE_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    host: HostConfig,
}

impl HostConfig {
    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_millis(self.initialize_timeout_ms)
    }

    pub fn post_initialize_timeout(&self) -> Duration {
        Duration::from_millis(self.post_initialize_timeout_ms)
    }

    pub fn uninitialize_timeout(&self) -> Duration {
        Duration::from_millis(self.uninitialize_timeout_ms)
    }

    pub fn validate(&self) -> HostResult<()> {
        let invalid = |field: &str, reason: &str| HostError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.config_root.trim().is_empty() {
            return Err(invalid("config_root", "must not be empty"));
        }
        if self.config_root.contains('/') {
            return Err(invalid("config_root", "must be a single path segment"));
        }
        for (field, value) in [
            ("initialize_timeout_ms", self.initialize_timeout_ms),
            ("post_initialize_timeout_ms", self.post_initialize_timeout_ms),
            ("uninitialize_timeout_ms", self.uninitialize_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.log_message_limit < 16 {
            return Err(invalid("log_message_limit", "must be at least 16 characters"));
        }
        Ok(())
    }

    /// Parse the `[host]` table of a configuration document. Other tables are
    /// ignored; a missing `[host]` table yields the defaults.
    pub fn from_toml_str(contents: &str) -> HostResult<Self> {
        let document: ConfigDocument =
            toml::from_str(contents).map_err(|source| HostError::ConfigParse {
                path: "<inline>".to_string(),
                source,
            })?;
        document.host.validate()?;
        Ok(document.host)
    }

    pub async fn load(path: &Path) -> HostResult<Self> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| HostError::ConfigFile {
                    path: path.display().to_string(),
                    source,
                })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            HostError::ConfigParse { source, .. } => HostError::ConfigParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }
}
