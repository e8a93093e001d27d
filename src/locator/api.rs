//! Public API for capability lookup

pub use crate::locator::attributed::Attributed;
