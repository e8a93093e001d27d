//! Built-in Module Implementations
//!
//! Modules that ship with the host binary. Each registers itself with
//! `builtin_module!` and is discovered through the inventory.

pub mod api;
pub mod heartbeat;
pub mod journal;
