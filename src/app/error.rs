//! Binary error type

use crate::config::api::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::host::api::HostError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Store(#[from] ConfigError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Failed to start the async runtime")]
    Runtime(#[source] std::io::Error),

    #[error("No configuration directory available; pass --store explicitly")]
    NoStorePath,
}

pub type AppResult<T> = Result<T, AppError>;

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Host(e) => e.is_user_actionable(),
            AppError::Store(e) => e.is_user_actionable(),
            AppError::Logging { .. } | AppError::NoStorePath => true,
            AppError::Runtime(_) => false,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            AppError::Host(e) => e.user_message(),
            AppError::Store(e) => e.user_message(),
            AppError::Logging { .. } | AppError::NoStorePath => Some(self.to_string()),
            AppError::Runtime(_) => None,
        }
    }
}
