//! Configuration Store
//!
//! Keyed hierarchical storage the host delegates module configuration and
//! parameters to, with an in-memory and a TOML-file implementation.

// Internal modules - all access should go through api module
pub(crate) mod error;
pub(crate) mod store;
pub(crate) mod toml_store;

// Public API module - the only public interface for configuration storage
pub mod api;
