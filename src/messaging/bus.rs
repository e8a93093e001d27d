//! Message bus
//!
//! The bus keeps two indexes: module → subscription set, and message type →
//! observing modules. A module observes a type while it holds at least one
//! handler for it. Lock order is always subscription set first, observer
//! index second.

use crate::context::api::{CallerContext, ModuleId};
use crate::core::sync::{read_lock, read_recover, write_lock, write_recover};
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::handler::{Filter, Handler};
use crate::messaging::message::{Lineage, Message};
use crate::messaging::registry::{Added, ModuleSubscriptions, Removed};
use futures::future::join_all;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

/// Outcome of dispatching one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Runtime type of the message
    pub message_type: &'static str,
    /// Handlers whose filter accepted the message
    pub matched: usize,
    /// Handlers that ran to completion without error
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub faulted: usize,
    /// Handlers skipped because their module closed before they ran
    pub skipped: usize,
}

impl DeliveryReport {
    /// True when no handler accepted the message.
    pub fn is_empty(&self) -> bool {
        self.matched == 0
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} matched, {} delivered, {} faulted",
            self.message_type, self.matched, self.delivered, self.faulted
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

enum Outcome {
    Delivered,
    Faulted,
    Skipped,
}

fn poisoned(message: String) -> MessagingError {
    MessagingError::Poisoned { message }
}

#[derive(Default)]
pub struct MessageBus {
    modules: RwLock<HashMap<ModuleId, Arc<ModuleSubscriptions>>>,
    observers: RwLock<HashMap<TypeId, Vec<Arc<ModuleSubscriptions>>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `module` an open subscription set and return it. A set left
    /// closed by an earlier teardown of the same name is replaced; the old
    /// set stays closed, so whoever still holds it cannot subscribe again.
    pub(crate) fn attach(&self, module: &ModuleId) -> MessagingResult<Arc<ModuleSubscriptions>> {
        let mut modules = write_lock(&self.modules, "bus modules", poisoned)?;
        let set = match modules.get(module) {
            Some(set) if !set.is_closed() => Arc::clone(set),
            _ => {
                let set = Arc::new(ModuleSubscriptions::new(module.clone()));
                modules.insert(module.clone(), Arc::clone(&set));
                set
            }
        };
        Ok(set)
    }

    fn subscriptions_of(&self, module: &ModuleId) -> MessagingResult<Arc<ModuleSubscriptions>> {
        if let Some(set) = read_lock(&self.modules, "bus modules", poisoned)?.get(module) {
            return Ok(Arc::clone(set));
        }
        let mut modules = write_lock(&self.modules, "bus modules", poisoned)?;
        let set = modules
            .entry(module.clone())
            .or_insert_with(|| Arc::new(ModuleSubscriptions::new(module.clone())));
        Ok(Arc::clone(set))
    }

    fn existing_subscriptions(&self, module: &ModuleId) -> Option<Arc<ModuleSubscriptions>> {
        read_recover(&self.modules, "bus modules").get(module).cloned()
    }

    /// Subscribe `module` to messages viewable as `U`. Subscribing a handler
    /// that is already registered for `U` replaces its filter.
    ///
    /// Returns `true` when the handler was not registered before.
    pub fn subscribe<U>(
        &self,
        module: &ModuleId,
        handler: Handler<U>,
        filter: Option<Filter<U>>,
    ) -> MessagingResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let set = self.subscriptions_of(module)?;
        self.subscribe_to(&set, handler, filter)
    }

    /// [`MessageBus::subscribe`] into a specific subscription set, as handed
    /// out by [`MessageBus::attach`].
    pub(crate) fn subscribe_to<U>(
        &self,
        set: &Arc<ModuleSubscriptions>,
        handler: Handler<U>,
        filter: Option<Filter<U>>,
    ) -> MessagingResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let added = set.add(handler, filter, || {
            let mut observers = write_recover(&self.observers, "bus observers");
            let observing = observers.entry(TypeId::of::<U>()).or_default();
            if !observing.iter().any(|o| Arc::ptr_eq(o, set)) {
                observing.push(Arc::clone(set));
            }
        })?;

        log::trace!(
            "Module '{}' subscribed to {} ({:?})",
            set.module(),
            std::any::type_name::<U>(),
            added
        );
        Ok(added != Added::Replaced)
    }

    /// Remove a handler. Unknown handlers are ignored and yield `false`.
    pub fn unsubscribe<U>(&self, module: &ModuleId, handler: &Handler<U>) -> MessagingResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        match self.existing_subscriptions(module) {
            Some(set) => self.unsubscribe_from(&set, handler),
            None => Ok(false),
        }
    }

    pub(crate) fn unsubscribe_from<U>(
        &self,
        set: &Arc<ModuleSubscriptions>,
        handler: &Handler<U>,
    ) -> MessagingResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let removed = set.remove(handler, || {
            let type_id = TypeId::of::<U>();
            let mut observers = write_recover(&self.observers, "bus observers");
            if let Some(observing) = observers.get_mut(&type_id) {
                observing.retain(|o| !Arc::ptr_eq(o, set));
                if observing.is_empty() {
                    observers.remove(&type_id);
                }
            }
        })?;

        if removed == Removed::LastForType {
            log::trace!(
                "Module '{}' no longer observes {}",
                set.module(),
                std::any::type_name::<U>()
            );
        }
        Ok(removed != Removed::NotFound)
    }

    /// Close `module`'s subscription set and drop all its handlers at once.
    /// Handlers already selected for a message but not yet started are
    /// skipped. Returns the number of message types it stopped observing.
    pub fn clear_module(&self, module: &ModuleId) -> usize {
        let Some(set) = self.existing_subscriptions(module) else {
            return 0;
        };
        let types = set.close();

        let mut observers = write_recover(&self.observers, "bus observers");
        for type_id in &types {
            if let Some(observing) = observers.get_mut(type_id) {
                observing.retain(|o| !Arc::ptr_eq(o, &set));
                if observing.is_empty() {
                    observers.remove(type_id);
                }
            }
        }

        if !types.is_empty() {
            log::debug!(
                "Cleared subscriptions of module '{}' ({} message types)",
                module,
                types.len()
            );
        }
        types.len()
    }

    /// True when some module holds a handler for `U`.
    pub fn is_observed<U: ?Sized + 'static>(&self) -> bool {
        read_recover(&self.observers, "bus observers")
            .get(&TypeId::of::<U>())
            .is_some_and(|observing| !observing.is_empty())
    }

    /// Number of handlers `module` holds for `U`.
    pub fn handler_count<U: ?Sized + 'static>(&self, module: &ModuleId) -> usize {
        self.existing_subscriptions(module)
            .map(|set| set.handler_count::<U>())
            .unwrap_or(0)
    }

    /// Number of `module`'s handlers for `U` that carry a filter.
    pub fn filtered_count<U: ?Sized + 'static>(&self, module: &ModuleId) -> usize {
        self.existing_subscriptions(module)
            .map(|set| set.filtered_count::<U>())
            .unwrap_or(0)
    }

    /// Total number of handlers `module` holds.
    pub fn subscription_count(&self, module: &ModuleId) -> usize {
        self.existing_subscriptions(module)
            .map(|set| set.total_handlers())
            .unwrap_or(0)
    }

    /// Publish `message` and wait for every accepting handler to finish.
    pub async fn send<M: Message>(&self, message: M) -> DeliveryReport {
        self.send_shared(Arc::new(message)).await
    }

    /// [`MessageBus::send`] for a message that is already shared.
    pub async fn send_shared<M: Message>(&self, message: Arc<M>) -> DeliveryReport {
        let lineage = Lineage::of(message);
        let mut report = DeliveryReport {
            message_type: lineage.runtime_type_name(),
            ..DeliveryReport::default()
        };

        let mut tasks = Vec::new();
        let mut failed_to_start = 0;
        for view in lineage.views() {
            let observing = read_recover(&self.observers, "bus observers")
                .get(&view.type_id)
                .cloned()
                .unwrap_or_default();

            for set in observing {
                for delivery in set.select(view) {
                    let module = delivery.module;
                    let message_type = delivery.message_type;
                    let Some(future) = delivery.future else {
                        failed_to_start += 1;
                        continue;
                    };
                    let set = Arc::clone(&set);
                    let label = module.clone();
                    let run = async move {
                        if set.is_closed() {
                            return Outcome::Skipped;
                        }
                        match future.await {
                            Ok(()) => Outcome::Delivered,
                            Err(e) => {
                                log::warn!(
                                    "Handler of module '{}' for {} failed: {}",
                                    label,
                                    message_type,
                                    e
                                );
                                Outcome::Faulted
                            }
                        }
                    };
                    let handle = tokio::spawn(CallerContext::scope(Some(module.clone()), run));
                    tasks.push((module, message_type, handle));
                }
            }
        }

        report.matched = tasks.len() + failed_to_start;
        report.faulted = failed_to_start;
        if tasks.is_empty() {
            if report.matched == 0 {
                log::trace!("No subscriber for {}", report.message_type);
            }
            return report;
        }

        let (labels, handles): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .map(|(module, message_type, handle)| ((module, message_type), handle))
            .unzip();

        for ((module, message_type), joined) in labels.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Outcome::Delivered) => report.delivered += 1,
                Ok(Outcome::Faulted) => report.faulted += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) if e.is_panic() => {
                    log::error!(
                        "Handler of module '{}' for {} panicked",
                        module,
                        message_type
                    );
                    report.faulted += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Handler of module '{}' for {} was cancelled: {}",
                        module,
                        message_type,
                        e
                    );
                    report.faulted += 1;
                }
            }
        }

        log::trace!("Dispatched {}", report);
        report
    }

    /// Publish `message` without waiting for handlers. The returned handle
    /// resolves to the delivery report.
    pub fn post<M: Message>(self: &Arc<Self>, message: M) -> JoinHandle<DeliveryReport> {
        let bus = Arc::clone(self);
        CallerContext::spawn(async move { bus.send(message).await })
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules = read_recover(&self.modules, "bus modules").len();
        let types = read_recover(&self.observers, "bus observers").len();
        f.debug_struct("MessageBus")
            .field("modules", &modules)
            .field("observed_types", &types)
            .finish()
    }
}
