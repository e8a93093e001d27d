//! Lifecycle messages published by the host
//!
//! The host publishes these on its own bus with no caller. Subscribe to
//! `dyn LifecycleEvent` to see all of them, or to a concrete type.

use crate::context::api::ModuleId;
use crate::host::report::LifecycleFailure;
use crate::module::types::{ModuleInfo, ModuleState};

/// Common view of every lifecycle message
pub trait LifecycleEvent: Send + Sync {
    fn module(&self) -> &ModuleId;

    /// State the module is in once the event is published
    fn state(&self) -> ModuleState;

    fn describe(&self) -> String;
}

/// A module finished post-initialization and is running
#[derive(Debug, Clone)]
pub struct ModuleLoaded {
    pub module: ModuleId,
    pub info: ModuleInfo,
}

/// A module failed to load and was excluded
#[derive(Debug, Clone)]
pub struct ModuleFaulted {
    pub failure: LifecycleFailure,
}

/// A module was torn down
#[derive(Debug, Clone)]
pub struct ModuleUnloaded {
    pub module: ModuleId,
    /// False when `uninitialize` failed
    pub clean: bool,
}

impl LifecycleEvent for ModuleLoaded {
    fn module(&self) -> &ModuleId {
        &self.module
    }

    fn state(&self) -> ModuleState {
        ModuleState::PostInitialized
    }

    fn describe(&self) -> String {
        format!("module '{}' {} loaded", self.module, self.info.version)
    }
}

impl LifecycleEvent for ModuleFaulted {
    fn module(&self) -> &ModuleId {
        &self.failure.module
    }

    fn state(&self) -> ModuleState {
        ModuleState::Faulted
    }

    fn describe(&self) -> String {
        self.failure.to_string()
    }
}

impl LifecycleEvent for ModuleUnloaded {
    fn module(&self) -> &ModuleId {
        &self.module
    }

    fn state(&self) -> ModuleState {
        ModuleState::Uninitialized
    }

    fn describe(&self) -> String {
        if self.clean {
            format!("module '{}' unloaded", self.module)
        } else {
            format!("module '{}' unloaded with errors", self.module)
        }
    }
}

crate::message!(ModuleLoaded: dyn LifecycleEvent);
crate::message!(ModuleFaulted: dyn LifecycleEvent);
crate::message!(ModuleUnloaded: dyn LifecycleEvent);
