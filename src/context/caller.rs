//! Caller identity propagated along a logical call chain
//!
//! The current caller is stored in a tokio task-local. It follows every
//! `.await` of the task that established it, is restored when the scope that
//! set it completes, and is invisible to unrelated tasks. A spawned task only
//! inherits it through [`CallerContext::spawn`] or [`CallerContext::bind`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Stable identity of a module within a host
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModuleId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl PartialEq<str> for ModuleId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ModuleId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

tokio::task_local! {
    static CURRENT_CALLER: Option<ModuleId>;
}

/// Accessors for the ambient caller identity
///
/// `None` means "no originating module": a call that entered from outside the
/// host (a transport binding, the composition root) or host-internal work.
pub struct CallerContext;

impl CallerContext {
    /// The module currently making calls, if any.
    pub fn current() -> Option<ModuleId> {
        CURRENT_CALLER.try_with(|caller| caller.clone()).ok().flatten()
    }

    /// Run `future` with `caller` as the current caller. The previous value is
    /// visible again once the returned future completes.
    pub fn scope<F: Future>(
        caller: Option<ModuleId>,
        future: F,
    ) -> impl Future<Output = F::Output> {
        CURRENT_CALLER.scope(caller, future)
    }

    /// Synchronous counterpart of [`CallerContext::scope`].
    pub fn sync_scope<R>(caller: Option<ModuleId>, f: impl FnOnce() -> R) -> R {
        CURRENT_CALLER.sync_scope(caller, f)
    }

    /// Run `future` as an externally triggered operation with no caller.
    pub fn external<F: Future>(future: F) -> impl Future<Output = F::Output> {
        Self::scope(None, future)
    }

    /// Capture the current caller and attach it to `future`, so it survives
    /// being moved into another task.
    pub fn bind<F: Future>(future: F) -> impl Future<Output = F::Output> {
        Self::scope(Self::current(), future)
    }

    /// `tokio::spawn` that hands the current caller over to the new task.
    pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::bind(future))
    }
}
