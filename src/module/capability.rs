//! Published capabilities
//!
//! A capability is an interface one module offers to others, usually a
//! `dyn Trait`. Types opt in by implementing [`Capability`] (or through the
//! [`capability!`](crate::capability) macro). Each module fills a
//! [`CapabilitySet`] once at registration; lookups afterwards are map hits
//! keyed by `TypeId`.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Marker for types that may be published and resolved
pub trait Capability: Send + Sync + 'static {}

/// Mark one or more types as capabilities.
///
/// ```ignore
/// pub trait Journal: Send + Sync { fn entries(&self) -> Vec<String>; }
/// capability!(dyn Journal);
/// ```
#[macro_export]
macro_rules! capability {
    ($($ty:ty),+ $(,)?) => {
        $( impl $crate::module::api::Capability for $ty {} )+
    };
}

/// Identity of a capability type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl CapabilityKey {
    pub fn of<C: ?Sized + Capability>() -> Self {
        Self::of_any::<C>()
    }

    pub(crate) fn of_any<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is<C: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<C>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityKey({})", self.type_name)
    }
}

/// A provider instance with its capability type erased
#[derive(Clone)]
pub struct AnyCapability {
    key: CapabilityKey,
    /// Holds an `Arc<C>`
    value: Arc<dyn Any + Send + Sync>,
}

impl AnyCapability {
    pub fn new<C: ?Sized + Capability>(provider: Arc<C>) -> Self {
        Self {
            key: CapabilityKey::of::<C>(),
            value: Arc::new(provider),
        }
    }

    pub fn key(&self) -> CapabilityKey {
        self.key
    }

    pub fn downcast<C: ?Sized + Capability>(&self) -> Option<Arc<C>> {
        self.value.downcast_ref::<Arc<C>>().cloned()
    }
}

impl fmt::Debug for AnyCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCapability")
            .field("type", &self.key.type_name)
            .finish()
    }
}

/// Extension point for modules that supply capabilities on demand instead
/// of publishing them up front
///
/// Queried only when the module's [`CapabilitySet`] has no entry for the
/// requested type.
pub trait ImplicitProvider: Send + Sync {
    fn provide(self: Arc<Self>, capability: CapabilityKey) -> Option<AnyCapability>;
}

/// Capabilities published by one module
#[derive(Clone, Default)]
pub struct CapabilitySet {
    entries: HashMap<TypeId, AnyCapability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `provider` as `C`. Publishing the same type again replaces the
    /// earlier provider.
    pub fn provide<C: ?Sized + Capability>(&mut self, provider: Arc<C>) -> &mut Self {
        let capability = AnyCapability::new(provider);
        if self
            .entries
            .insert(capability.key.type_id, capability)
            .is_some()
        {
            log::debug!(
                "Capability {} published twice; keeping the latest provider",
                std::any::type_name::<C>()
            );
        }
        self
    }

    pub fn get<C: ?Sized + Capability>(&self) -> Option<Arc<C>> {
        self.entries.get(&TypeId::of::<C>())?.downcast::<C>()
    }

    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the published types, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|c| c.key.type_name).collect();
        names.sort_unstable();
        names
    }

    /// Drop entries whose type is reserved. Returns the withheld type names.
    pub(crate) fn withhold(&mut self, reserved: &HashSet<TypeId>) -> Vec<&'static str> {
        let mut withheld = Vec::new();
        self.entries.retain(|type_id, capability| {
            let keep = !reserved.contains(type_id);
            if !keep {
                withheld.push(capability.key.type_name);
            }
            keep
        });
        withheld
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}
