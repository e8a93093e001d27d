//! Host integration test modules

pub mod builtins;
pub mod scenarios;
pub mod store;
