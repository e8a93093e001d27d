//! Module Host
//!
//! Registration, the lifecycle state machine, capability resolution
//! through the locator, lifecycle events and the logging sink.

// Internal modules - all access should go through api module
pub(crate) mod config;
pub(crate) mod entry;
pub(crate) mod error;
pub(crate) mod events;
pub(crate) mod logger;
pub(crate) mod manager;
pub(crate) mod report;
pub(crate) mod state;

// Public API module - the only public interface for embedding the host
pub mod api;

#[cfg(test)]
mod tests;
