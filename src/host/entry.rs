//! Registered module record

use crate::context::api::{CancellationSignal, ModuleId};
use crate::core::sync::{read_recover, write_recover};
use crate::locator::resolver::Provider;
use crate::module::traits::Module;
use crate::module::types::{ModuleInfo, ModuleState};
use std::sync::{Arc, RwLock};

pub(crate) struct ModuleEntry {
    pub(crate) id: ModuleId,
    pub(crate) info: ModuleInfo,
    pub(crate) module: Arc<dyn Module>,
    pub(crate) provider: Provider,
    pub(crate) cancellation: CancellationSignal,
    state: RwLock<ModuleState>,
}

impl ModuleEntry {
    pub(crate) fn new(
        info: ModuleInfo,
        module: Arc<dyn Module>,
        provider: Provider,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            id: provider.id().clone(),
            info,
            module,
            provider,
            cancellation,
            state: RwLock::new(ModuleState::Created),
        }
    }

    pub(crate) fn state(&self) -> ModuleState {
        *read_recover(&self.state, "module state")
    }

    pub(crate) fn set_state(&self, state: ModuleState) {
        let mut current = write_recover(&self.state, "module state");
        log::trace!("Module '{}': {} -> {}", self.id, *current, state);
        *current = state;
    }
}
