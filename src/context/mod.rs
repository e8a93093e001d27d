//! Caller Context
//!
//! Ambient "which module is calling" identity that follows a logical call
//! chain across awaits, plus the per-module cancellation signal.

// Internal modules - all access should go through api module
pub(crate) mod caller;
pub(crate) mod cancellation;

// Public API module - the only public interface for caller context
pub mod api;
