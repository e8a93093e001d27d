//! Capability resolution over a module snapshot

use crate::config::api::ConfigStore;
use crate::context::api::{CallerContext, ModuleId};
use crate::host::logger::LogSink;
use crate::locator::attributed::Attributed;
use crate::messaging::api::MessageBus;
use crate::module::capability::{Capability, CapabilityKey, CapabilitySet, ImplicitProvider};
use crate::module::traits::Module;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// What one module can supply to others
pub(crate) struct Provider {
    id: ModuleId,
    capabilities: CapabilitySet,
    implicit: Option<Arc<dyn ImplicitProvider>>,
}

impl Provider {
    pub(crate) fn new(
        id: ModuleId,
        capabilities: CapabilitySet,
        implicit: Option<Arc<dyn ImplicitProvider>>,
    ) -> Self {
        Self {
            id,
            capabilities,
            implicit,
        }
    }

    pub(crate) fn id(&self) -> &ModuleId {
        &self.id
    }

    pub(crate) fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// The published capability, else whatever the implicit provider offers.
    fn lookup<C: ?Sized + Capability>(&self) -> Option<Arc<C>> {
        if let Some(capability) = self.capabilities.get::<C>() {
            return Some(capability);
        }
        let implicit = Arc::clone(self.implicit.as_ref()?);
        implicit.provide(CapabilityKey::of::<C>())?.downcast::<C>()
    }
}

/// Who is asking
#[derive(Debug, Clone)]
pub(crate) struct Lookup {
    /// Module whose handle performs the lookup; `None` for host-level lookups
    owner: Option<ModuleId>,
    /// Caller context at the time of the lookup
    context: Option<ModuleId>,
}

impl Lookup {
    pub(crate) fn from_handle(owner: &ModuleId) -> Self {
        Self {
            owner: Some(owner.clone()),
            context: CallerContext::current(),
        }
    }

    pub(crate) fn from_host() -> Self {
        Self {
            owner: None,
            context: CallerContext::current(),
        }
    }

    fn excludes(&self, module: &ModuleId) -> bool {
        self.owner.as_ref() == Some(module) || self.context.as_ref() == Some(module)
    }

    /// Identity calls through the results are attributed to
    fn caller(&self) -> Option<ModuleId> {
        self.context.clone().or_else(|| self.owner.clone())
    }
}

/// Upper bound on results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    First,
    All,
}

pub(crate) struct ServiceLocator {
    reserved: HashSet<TypeId>,
}

impl ServiceLocator {
    pub(crate) fn new(extra_reserved: impl IntoIterator<Item = TypeId>) -> Self {
        let mut reserved = default_reserved();
        reserved.extend(extra_reserved);
        Self { reserved }
    }

    pub(crate) fn reserved(&self) -> &HashSet<TypeId> {
        &self.reserved
    }

    pub(crate) fn is_reserved<C: ?Sized + 'static>(&self) -> bool {
        self.reserved.contains(&TypeId::of::<C>())
    }

    /// Walk `providers` in order, skipping the requester, collecting `C`.
    pub(crate) fn resolve<'a, C>(
        &self,
        providers: impl IntoIterator<Item = &'a Provider>,
        lookup: &Lookup,
        resolution: Resolution,
    ) -> Vec<Attributed<C>>
    where
        C: ?Sized + Capability,
    {
        if self.is_reserved::<C>() {
            log::debug!(
                "Refusing lookup of reserved capability {}",
                std::any::type_name::<C>()
            );
            return Vec::new();
        }

        let caller = lookup.caller();
        let mut found = Vec::new();
        for provider in providers {
            if lookup.excludes(&provider.id) {
                continue;
            }
            if let Some(target) = provider.lookup::<C>() {
                found.push(Attributed::new(target, provider.id.clone(), caller.clone()));
                if resolution == Resolution::First {
                    break;
                }
            }
        }

        log::trace!(
            "Resolved {} for {:?}: {} provider(s)",
            std::any::type_name::<C>(),
            caller,
            found.len()
        );
        found
    }
}

/// Host-internal types that are never handed out through lookups
fn default_reserved() -> HashSet<TypeId> {
    [
        TypeId::of::<dyn Module>(),
        TypeId::of::<dyn ImplicitProvider>(),
        TypeId::of::<dyn ConfigStore>(),
        TypeId::of::<dyn LogSink>(),
        TypeId::of::<MessageBus>(),
    ]
    .into_iter()
    .collect()
}
