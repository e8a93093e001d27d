//! Caller attribution for resolved capabilities
//!
//! [`Attributed`] holds a provider's capability and the identity of the
//! module that resolved it. Every call made through it runs with that
//! identity as the current caller, so the provider's logging and parameter
//! storage land under the requester rather than the provider.

use crate::context::api::{CallerContext, ModuleId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub struct Attributed<C: ?Sized> {
    target: Arc<C>,
    provider: ModuleId,
    caller: Option<ModuleId>,
}

impl<C: ?Sized> Attributed<C> {
    pub(crate) fn new(target: Arc<C>, provider: ModuleId, caller: Option<ModuleId>) -> Self {
        Self {
            target,
            provider,
            caller,
        }
    }

    /// Module that supplied the capability
    pub fn provider(&self) -> &ModuleId {
        &self.provider
    }

    /// Module calls are attributed to; `None` for external callers
    pub fn caller(&self) -> Option<&ModuleId> {
        self.caller.as_ref()
    }

    /// Call the capability synchronously as the original caller.
    pub fn invoke<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        CallerContext::sync_scope(self.caller.clone(), || f(&self.target))
    }

    /// Call an asynchronous capability method as the original caller. The
    /// caller stays current across every await of the returned future.
    pub async fn invoke_async<'a, R, F, Fut>(&'a self, f: F) -> R
    where
        F: FnOnce(&'a C) -> Fut,
        Fut: Future<Output = R>,
    {
        let target = &*self.target;
        CallerContext::scope(self.caller.clone(), async move { f(target).await }).await
    }
}

impl<C: ?Sized> Clone for Attributed<C> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            provider: self.provider.clone(),
            caller: self.caller.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Attributed<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributed")
            .field("capability", &std::any::type_name::<C>())
            .field("provider", &self.provider)
            .field("caller", &self.caller)
            .finish()
    }
}
