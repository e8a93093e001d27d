//! Module error types

use crate::config::api::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::messaging::api::MessagingError;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The host owning the handle has been dropped
    #[error("Host of module '{module}' is no longer available")]
    HostUnavailable { module: String },

    /// The module used its handle before the host attached it
    #[error("Module has no handle attached")]
    NotAttached,

    #[error("Configuration access failed for module '{module}'")]
    Config {
        module: String,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Module '{module}' was cancelled")]
    Cancelled { module: String },

    /// Failure reported by module code itself
    #[error("{message}")]
    Failed { message: String },
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

impl ModuleError {
    pub fn failed(message: impl Into<String>) -> Self {
        ModuleError::Failed {
            message: message.into(),
        }
    }
}

impl ContextualError for ModuleError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ModuleError::Config { source, .. } => source.is_user_actionable(),
            ModuleError::Failed { .. } => true,
            _ => false,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            ModuleError::Config { module, source } if source.is_user_actionable() => {
                Some(format!("module '{module}': {}", source.user_message()?))
            }
            ModuleError::Failed { message } => Some(message.clone()),
            _ => None,
        }
    }
}
