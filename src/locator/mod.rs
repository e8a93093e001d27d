//! Service Locator
//!
//! Resolves a capability type to the modules providing it, never to the
//! module asking, and wraps each result so calls through it are attributed
//! to the original caller.

// Internal modules - all access should go through api module
pub(crate) mod attributed;
pub(crate) mod resolver;

// Public API module - the only public interface for capability lookup
pub mod api;
