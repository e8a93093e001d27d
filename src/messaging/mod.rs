//! Messaging Bus
//!
//! Typed publish/subscribe between modules. A message is delivered to every
//! subscription declared for a type in its lineage, filtered per handler,
//! with matching handlers running concurrently.

// Internal modules - all access should go through api module
pub(crate) mod bus;
pub(crate) mod error;
pub(crate) mod handler;
pub(crate) mod message;
pub(crate) mod registry;

// Public API module - the only public interface for messaging
pub mod api;

#[cfg(test)]
mod tests;
