//! Public API for caller context and cancellation

pub use crate::context::caller::{CallerContext, ModuleId};
pub use crate::context::cancellation::CancellationSignal;
