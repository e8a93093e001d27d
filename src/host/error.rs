//! Host error types

use crate::config::api::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::host::report::LifecycleFailure;
use crate::host::state::HostState;
use crate::messaging::api::MessagingError;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A module failed to load; the host carries on without it
    #[error("{0}")]
    Load(LifecycleFailure),

    #[error("A module named '{module}' is already registered")]
    DuplicateModule { module: String },

    #[error("Cannot {operation} while the host is {state}")]
    InvalidState {
        operation: &'static str,
        state: HostState,
    },

    #[error("Invalid host setting '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to read configuration file '{path}'")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' is not valid")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Host state unavailable: {message}")]
    Poisoned { message: String },
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

impl ContextualError for HostError {
    fn is_user_actionable(&self) -> bool {
        match self {
            HostError::Load(_)
            | HostError::DuplicateModule { .. }
            | HostError::InvalidConfig { .. }
            | HostError::ConfigFile { .. }
            | HostError::ConfigParse { .. } => true,
            HostError::Config(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            HostError::Config(e) => e.user_message(),
            HostError::ConfigFile { path, source } => Some(format!("{path}: {source}")),
            HostError::ConfigParse { path, source } => Some(format!("{path}: {source}")),
            other if other.is_user_actionable() => Some(other.to_string()),
            _ => None,
        }
    }
}
