//! Messaging error types

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessagingError {
    /// The module's subscriptions were cleared by teardown or a load fault
    #[error("Module '{module}' no longer accepts subscriptions")]
    ModuleClosed { module: String },

    #[error("Message bus unavailable: {message}")]
    Poisoned { message: String },
}

/// Result type for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

impl ContextualError for MessagingError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<String> {
        None
    }
}
