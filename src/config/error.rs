//! Configuration store error types

use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access configuration file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' is not valid TOML")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Value for '{key}' cannot be stored: {reason}")]
    Unrepresentable { key: String, reason: String },

    #[error("Configuration value '{key}' does not match the requested type")]
    Convert {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration store unavailable: {message}")]
    Poisoned { message: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            ConfigError::Parse { .. } | ConfigError::Convert { .. } | ConfigError::Io { .. }
        )
    }

    fn user_message(&self) -> Option<String> {
        if !self.is_user_actionable() {
            return None;
        }
        Some(match self {
            ConfigError::Parse { path, source } => format!("{path}: {source}"),
            other => crate::core::error_handling::format_error(other, true),
        })
    }
}
