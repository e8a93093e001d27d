//! Generic error handling utilities
//!
//! Shared by the host, the binary and module-facing logging: a trait that
//! separates operator-actionable errors from internal ones, a logger that
//! respects that split, and a formatter for `source()` chains.

use std::error::Error;

/// Errors that can tell whether their message is meant for an operator
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: Error {
    /// True when the error carries a specific message the operator can act
    /// on (bad configuration, duplicate module names, incompatible modules).
    fn is_user_actionable(&self) -> bool;

    /// The operator-facing message for actionable errors.
    fn user_message(&self) -> Option<String>;
}

/// Log an error with a detail level that matches its specificity.
///
/// Actionable errors print their own message; internal errors print the
/// operation context, with the error itself demoted to debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message().filter(|_| error.is_user_actionable()) {
        Some(message) => log::error!("{operation_context}: {message}"),
        None => log::error!("{operation_context} failed"),
    }
    log::debug!("DETAIL: {error}");
    log::debug!("DEBUG_DETAILS: {error:?}");
}

/// Collect an error and all of its sources, outermost first.
pub fn error_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

/// Render an error as a single line, or with its cause chain when `with_trace`.
pub fn format_error(error: &(dyn Error + 'static), with_trace: bool) -> String {
    if !with_trace {
        return error.to_string();
    }
    let mut chain = error_chain(error).into_iter();
    let mut rendered = chain.next().unwrap_or_default();
    for cause in chain {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "module failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "disk unavailable")
        }
    }

    impl Error for Inner {}

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.inner)
        }
    }

    impl ContextualError for Outer {
        fn is_user_actionable(&self) -> bool {
            false
        }

        fn user_message(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_error_chain_walks_sources() {
        let error = Outer { inner: Inner };
        assert_eq!(error_chain(&error), vec!["module failed", "disk unavailable"]);
    }

    #[test]
    fn test_format_error_without_trace_is_single_line() {
        let error = Outer { inner: Inner };
        assert_eq!(format_error(&error, false), "module failed");
    }

    #[test]
    fn test_format_error_with_trace_lists_causes() {
        let error = Outer { inner: Inner };
        let rendered = format_error(&error, true);
        assert_eq!(rendered, "module failed\n  caused by: disk unavailable");
    }

    #[test]
    fn test_system_error_has_no_user_message() {
        let error = Outer { inner: Inner };
        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        log_error_with_context(&error, "Loading modules");
    }
}
