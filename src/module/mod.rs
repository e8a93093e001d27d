//! Modules
//!
//! The unit the host loads: the [`Module`](api::Module) trait, its
//! metadata and states, published capabilities, and the handle through
//! which it reaches host services.

// Internal modules - all access should go through api module
pub(crate) mod capability;
pub(crate) mod error;
pub(crate) mod handle;
pub(crate) mod traits;
pub(crate) mod types;

pub mod builtin;

// Public API module - the only public interface for module authors
pub mod api;
