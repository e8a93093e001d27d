//! modhost: an in-process module host
//!
//! Modules register with a [`ModuleHost`](host::api::ModuleHost), publish
//! capabilities other modules resolve through the service locator, and talk
//! over a typed message bus. Every call made through a resolved capability
//! is attributed to the module that asked for it.

pub mod app;
pub mod config;
pub mod context;
pub mod core;
pub mod host;
pub mod locator;
pub mod messaging;
pub mod module;
