//! Public API for module authors

pub use crate::module::capability::{
    AnyCapability, Capability, CapabilityKey, CapabilitySet, ImplicitProvider,
};
pub use crate::module::error::{ModuleError, ModuleResult};
pub use crate::module::handle::{HandleSlot, ModuleHandle};
pub use crate::module::traits::Module;
pub use crate::module::types::{LifecyclePhase, ModuleInfo, ModuleState};
