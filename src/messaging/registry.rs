//! Per-module subscription set
//!
//! Each module owns one [`ModuleSubscriptions`]: message type → handlers,
//! behind a reader/writer lock. Dispatch enumerates under the read lock;
//! subscribe, unsubscribe and teardown take the write lock.

use crate::context::api::ModuleId;
use crate::core::sync::{read_recover, write_lock, write_recover};
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::handler::{Filter, Handler, HandlerKey, HandlerResult};
use crate::messaging::message::MessageView;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Type-erased filter: false when the view has another type or the filter
/// rejects it
type ErasedFilter = Box<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// Type-erased handler producing the handler future for an accepted view
type ErasedInvoker =
    Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<BoxFuture<'static, HandlerResult>> + Send + Sync>;

struct Entry {
    accepts: ErasedFilter,
    invoker: ErasedInvoker,
    filtered: bool,
}

struct TypeEntries {
    type_name: &'static str,
    handlers: HashMap<HandlerKey, Entry>,
}

/// A handler invocation selected for one message
pub(crate) struct Delivery {
    pub(crate) module: ModuleId,
    pub(crate) message_type: &'static str,
    /// `None` when the handler panicked before returning its future
    pub(crate) future: Option<BoxFuture<'static, HandlerResult>>,
}

/// Outcome of adding a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Added {
    /// First handler for the type: the module must start observing it
    FirstForType,
    /// Another handler for an already observed type
    Additional,
    /// The handler was already registered; its filter was replaced
    Replaced,
}

/// Outcome of removing a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removed {
    NotFound,
    /// Removed; other handlers remain for the type
    Remaining,
    /// Removed the last handler: the module must stop observing the type
    LastForType,
}

pub(crate) struct ModuleSubscriptions {
    module: ModuleId,
    closed: AtomicBool,
    entries: RwLock<HashMap<TypeId, TypeEntries>>,
}

impl ModuleSubscriptions {
    pub(crate) fn new(module: ModuleId) -> Self {
        Self {
            module,
            closed: AtomicBool::new(false),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn module(&self) -> &ModuleId {
        &self.module
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Add or replace a handler. `on_first` runs while the write lock is
    /// still held, so observer registration cannot interleave with a
    /// concurrent removal of the same type.
    pub(crate) fn add<U>(
        &self,
        handler: Handler<U>,
        filter: Option<Filter<U>>,
        on_first: impl FnOnce(),
    ) -> MessagingResult<Added>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let mut entries = write_lock(&self.entries, "subscriptions", |message| {
            MessagingError::Poisoned { message }
        })?;
        if self.is_closed() {
            return Err(MessagingError::ModuleClosed {
                module: self.module.to_string(),
            });
        }

        let key = handler.key();
        let entry = Entry {
            filtered: filter.is_some(),
            accepts: erase_filter(filter),
            invoker: erase_handler(handler),
        };

        let type_entries = entries.entry(TypeId::of::<U>()).or_insert_with(|| TypeEntries {
            type_name: std::any::type_name::<U>(),
            handlers: HashMap::new(),
        });
        let was_empty = type_entries.handlers.is_empty();

        let added = match type_entries.handlers.insert(key, entry) {
            Some(_) => Added::Replaced,
            None if was_empty => Added::FirstForType,
            None => Added::Additional,
        };
        if added == Added::FirstForType {
            on_first();
        }
        Ok(added)
    }

    /// Remove a handler. `on_last` runs under the write lock when the type
    /// loses its last handler.
    pub(crate) fn remove<U>(
        &self,
        handler: &Handler<U>,
        on_last: impl FnOnce(),
    ) -> MessagingResult<Removed>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let mut entries = write_lock(&self.entries, "subscriptions", |message| {
            MessagingError::Poisoned { message }
        })?;

        let type_id = TypeId::of::<U>();
        let Some(type_entries) = entries.get_mut(&type_id) else {
            return Ok(Removed::NotFound);
        };
        if type_entries.handlers.remove(&handler.key()).is_none() {
            return Ok(Removed::NotFound);
        }
        if !type_entries.handlers.is_empty() {
            return Ok(Removed::Remaining);
        }

        entries.remove(&type_id);
        on_last();
        Ok(Removed::LastForType)
    }

    /// Close the set and drop every handler. Returns the types the module was
    /// observing. No handler is selected for dispatch after this returns.
    pub(crate) fn close(&self) -> Vec<TypeId> {
        let mut entries = write_recover(&self.entries, "subscriptions");
        self.closed.store(true, Ordering::Release);
        entries.drain().map(|(type_id, _)| type_id).collect()
    }

    /// Select the handlers accepting `view`.
    pub(crate) fn select(&self, view: &MessageView) -> Vec<Delivery> {
        if self.is_closed() {
            return Vec::new();
        }
        let entries = read_recover(&self.entries, "subscriptions");
        let Some(type_entries) = entries.get(&view.type_id) else {
            return Vec::new();
        };

        let mut deliveries = Vec::with_capacity(type_entries.handlers.len());
        for entry in type_entries.handlers.values() {
            let value = view.value.as_ref();
            match catch_unwind(AssertUnwindSafe(|| (entry.accepts)(value))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => {
                    log::warn!(
                        "Filter of module '{}' for {} panicked; message not delivered to that handler",
                        self.module,
                        type_entries.type_name
                    );
                    continue;
                }
            }

            let future = match catch_unwind(AssertUnwindSafe(|| (entry.invoker)(value))) {
                Ok(Some(future)) => Some(future),
                Ok(None) => continue,
                Err(_) => {
                    log::error!(
                        "Handler of module '{}' for {} panicked before it started",
                        self.module,
                        type_entries.type_name
                    );
                    None
                }
            };
            deliveries.push(Delivery {
                module: self.module.clone(),
                message_type: type_entries.type_name,
                future,
            });
        }
        deliveries
    }

    pub(crate) fn handler_count<U: ?Sized + 'static>(&self) -> usize {
        read_recover(&self.entries, "subscriptions")
            .get(&TypeId::of::<U>())
            .map(|t| t.handlers.len())
            .unwrap_or(0)
    }

    pub(crate) fn filtered_count<U: ?Sized + 'static>(&self) -> usize {
        read_recover(&self.entries, "subscriptions")
            .get(&TypeId::of::<U>())
            .map(|t| t.handlers.values().filter(|e| e.filtered).count())
            .unwrap_or(0)
    }

    pub(crate) fn total_handlers(&self) -> usize {
        read_recover(&self.entries, "subscriptions")
            .values()
            .map(|t| t.handlers.len())
            .sum()
    }
}

fn erase_filter<U>(filter: Option<Filter<U>>) -> ErasedFilter
where
    U: ?Sized + Send + Sync + 'static,
{
    Box::new(move |view: &(dyn Any + Send + Sync)| {
        let Some(message) = view.downcast_ref::<std::sync::Arc<U>>() else {
            return false;
        };
        filter.as_ref().is_none_or(|filter| filter.accepts(message))
    })
}

fn erase_handler<U>(handler: Handler<U>) -> ErasedInvoker
where
    U: ?Sized + Send + Sync + 'static,
{
    Box::new(move |view: &(dyn Any + Send + Sync)| {
        let message = view.downcast_ref::<std::sync::Arc<U>>()?;
        Some(handler.invoke(message.clone()))
    })
}
