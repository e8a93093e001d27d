//! Module Handle
//!
//! The capability-scoped view of host services given to each module. It
//! holds only a weak reference to the host, so a module keeping its handle
//! never keeps the host alive; once the host is gone, configuration calls
//! fail with [`ModuleError::HostUnavailable`] and lookups come back empty.
//!
//! A handle belongs to one registration. Once that registration is
//! cancelled (fault, teardown, or the module itself) the handle takes no new
//! subscriptions, even if another module later registers under the same name.
//!
//! Configuration is scoped to the module owning the handle. Parameters and
//! log headers follow the caller context, so a provider serving an
//! attributed call stores parameters and logs under the requester.

use crate::config::api::{ConfigError, ConfigValue};
use crate::context::api::{CallerContext, CancellationSignal, ModuleId};
use crate::core::error_handling::format_error;
use crate::host::logger::Severity;
use crate::host::manager::HostInner;
use crate::locator::api::Attributed;
use crate::locator::resolver::{Lookup, Resolution};
use crate::messaging::api::{DeliveryReport, Filter, Handler, Message};
use crate::messaging::registry::ModuleSubscriptions;
use crate::module::capability::Capability;
use crate::module::error::{ModuleError, ModuleResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tokio::task::JoinHandle;

const CONFIGURATION_NAME: &str = "configuration";

pub struct ModuleHandle {
    module: ModuleId,
    host: Weak<HostInner>,
    cancellation: CancellationSignal,
    subscriptions: Arc<ModuleSubscriptions>,
}

impl ModuleHandle {
    pub(crate) fn new(
        module: ModuleId,
        host: Weak<HostInner>,
        cancellation: CancellationSignal,
        subscriptions: Arc<ModuleSubscriptions>,
    ) -> Self {
        Self {
            module,
            host,
            cancellation,
            subscriptions,
        }
    }

    /// The module owning this handle
    pub fn id(&self) -> &ModuleId {
        &self.module
    }

    /// The module's cancellation signal, asserted by the host on fault and
    /// at teardown. Modules may also assert it themselves.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    fn host(&self) -> ModuleResult<Arc<HostInner>> {
        self.host.upgrade().ok_or_else(|| ModuleError::HostUnavailable {
            module: self.module.to_string(),
        })
    }

    /// Module the current call is attributed to
    fn acting_module(&self) -> ModuleId {
        CallerContext::current().unwrap_or_else(|| self.module.clone())
    }

    fn config_error(&self, source: ConfigError) -> ModuleError {
        ModuleError::Config {
            module: self.module.to_string(),
            source,
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: ConfigValue) -> ModuleResult<T> {
        serde_json::from_value(value).map_err(|source| {
            self.config_error(ConfigError::Convert {
                key: key.to_string(),
                source,
            })
        })
    }

    fn encode<T: Serialize>(&self, key: &str, value: &T) -> ModuleResult<ConfigValue> {
        serde_json::to_value(value).map_err(|source| {
            self.config_error(ConfigError::Convert {
                key: key.to_string(),
                source,
            })
        })
    }

    /// Stored configuration of this module, if any.
    pub fn get_configuration<T: DeserializeOwned>(&self) -> ModuleResult<Option<T>> {
        let host = self.host()?;
        let section = host.module_section(&self.module);
        host.store
            .get(&host.config.config_root, &section, CONFIGURATION_NAME)
            .map_err(|e| self.config_error(e))?
            .map(|value| self.decode(&section, value))
            .transpose()
    }

    pub fn set_configuration<T: Serialize>(&self, configuration: &T) -> ModuleResult<()> {
        let host = self.host()?;
        let section = host.module_section(&self.module);
        let value = self.encode(&section, configuration)?;
        host.store
            .set(&host.config.config_root, &section, CONFIGURATION_NAME, Some(value))
            .map_err(|e| self.config_error(e))
    }

    /// Named parameter of the module the current call is attributed to.
    pub fn get_parameter<T: DeserializeOwned>(&self, name: &str) -> ModuleResult<Option<T>> {
        let host = self.host()?;
        let section = host.parameter_section(&self.acting_module());
        host.store
            .get(&host.config.config_root, &section, name)
            .map_err(|e| self.config_error(e))?
            .map(|value| self.decode(name, value))
            .transpose()
    }

    /// Store a named parameter; `None` deletes it.
    pub fn set_parameter<T: Serialize>(&self, name: &str, value: Option<&T>) -> ModuleResult<()> {
        let host = self.host()?;
        let section = host.parameter_section(&self.acting_module());
        let value = value.map(|v| self.encode(name, v)).transpose()?;
        host.store
            .set(&host.config.config_root, &section, name, value)
            .map_err(|e| self.config_error(e))
    }

    /// First other module providing `C`, in registration order.
    pub fn resolve_one<C: ?Sized + Capability>(&self) -> Option<Attributed<C>> {
        let host = self.host.upgrade()?;
        host.resolve(&Lookup::from_handle(&self.module), Resolution::First)
            .into_iter()
            .next()
    }

    /// Every other module providing `C`, in registration order.
    pub fn resolve_many<C: ?Sized + Capability>(&self) -> Vec<Attributed<C>> {
        match self.host.upgrade() {
            Some(host) => host.resolve(&Lookup::from_handle(&self.module), Resolution::All),
            None => Vec::new(),
        }
    }

    pub fn log(&self, message: impl AsRef<str>, severity: Severity) {
        let acting = self.acting_module();
        match self.host.upgrade() {
            Some(host) => host.write_log(message.as_ref(), severity, Some(&acting)),
            None => log::log!(severity.level(), "[{}] {}", acting, message.as_ref()),
        }
    }

    /// Log an error at `Error` severity, with its cause chain when
    /// `include_trace` is set.
    pub fn log_error(&self, error: &(dyn std::error::Error + 'static), include_trace: bool) {
        self.log(format_error(error, include_trace), Severity::Error);
    }

    /// Publish a message and wait for its handlers.
    pub async fn send<M: Message>(&self, message: M) -> ModuleResult<DeliveryReport> {
        let host = self.host()?;
        Ok(host.bus.send(message).await)
    }

    /// Publish a message without waiting for its handlers.
    pub fn post<M: Message>(&self, message: M) -> ModuleResult<JoinHandle<DeliveryReport>> {
        let host = self.host()?;
        Ok(host.bus.post(message))
    }

    /// Subscribe this module to messages viewable as `U`.
    ///
    /// Returns `false` when the handler was already subscribed; its filter
    /// is replaced. Fails with [`ModuleError::Cancelled`] once the module's
    /// cancellation signal is asserted.
    pub fn subscribe<U>(&self, handler: Handler<U>, filter: Option<Filter<U>>) -> ModuleResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        if self.cancellation.is_cancelled() {
            return Err(ModuleError::Cancelled {
                module: self.module.to_string(),
            });
        }
        let host = self.host()?;
        Ok(host.bus.subscribe_to(&self.subscriptions, handler, filter)?)
    }

    /// Returns `false` when the handler was not subscribed.
    pub fn unsubscribe<U>(&self, handler: &Handler<U>) -> ModuleResult<bool>
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let host = self.host()?;
        Ok(host.bus.unsubscribe_from(&self.subscriptions, handler)?)
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("module", &self.module)
            .field("host_alive", &(self.host.strong_count() > 0))
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Storage for the handle a module receives in [`Module::attach`]
///
/// [`Module::attach`]: crate::module::api::Module::attach
#[derive(Debug, Default)]
pub struct HandleSlot {
    handle: OnceLock<ModuleHandle>,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the handle. A second handle is ignored.
    pub fn set(&self, handle: ModuleHandle) {
        if let Err(rejected) = self.handle.set(handle) {
            log::warn!("Module '{}' was attached twice; keeping the first handle", rejected.id());
        }
    }

    pub fn get(&self) -> ModuleResult<&ModuleHandle> {
        self.handle.get().ok_or(ModuleError::NotAttached)
    }

    pub fn is_attached(&self) -> bool {
        self.handle.get().is_some()
    }
}
