//! Module Host
//!
//! Owns the module list and drives every module through its lifecycle.
//!
//! Two lists are kept: every registered module in registration order
//! (teardown walks it backwards), and the routable snapshot the locator
//! iterates. The routable list lives in an `ArcSwap`: writers publish a new
//! vector, readers load the current `Arc` and never see a torn list.
//!
//! Every module's cancellation signal is a child of the host's root signal.
//! Dropping the host cancels the root, so background work of modules that
//! were never shut down still stops.
//!
//! Register, start and shutdown are serialized by a lifecycle lock. Lookups
//! and messaging never take it.

use crate::config::api::{ConfigStore, MemoryConfigStore};
use crate::context::api::{CallerContext, CancellationSignal, ModuleId};
use crate::core::error_handling::format_error;
use crate::core::sync::{read_recover, write_recover};
use crate::core::version::get_api_version;
use crate::host::config::HostConfig;
use crate::host::entry::ModuleEntry;
use crate::host::error::{HostError, HostResult};
use crate::host::events::{ModuleFaulted, ModuleLoaded, ModuleUnloaded};
use crate::host::logger::{split_message, LogFacadeSink, LogSink, Severity};
use crate::host::report::{FailureReason, LifecycleFailure, LoadReport, ShutdownReport};
use crate::host::state::HostState;
use crate::locator::api::Attributed;
use crate::locator::resolver::{Lookup, Provider, Resolution, ServiceLocator};
use crate::messaging::api::{Message, MessageBus};
use crate::module::capability::{Capability, CapabilitySet};
use crate::module::handle::ModuleHandle;
use crate::module::traits::Module;
use crate::module::types::{LifecyclePhase, ModuleInfo, ModuleState};
use arc_swap::ArcSwap;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Deferred module construction, used by [`ModuleHost::load`]
pub type ModuleFactory = Box<dyn FnOnce() -> Arc<dyn Module> + Send>;

/// Box a constructor as a [`ModuleFactory`].
pub fn factory<M, F>(constructor: F) -> ModuleFactory
where
    M: Module,
    F: FnOnce() -> M + Send + 'static,
{
    Box::new(move || Arc::new(constructor()) as Arc<dyn Module>)
}

/// Metadata and state of one registered module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub info: ModuleInfo,
    pub state: ModuleState,
    /// Published capability type names
    pub capabilities: Vec<&'static str>,
}

pub(crate) struct HostInner {
    pub(crate) config: HostConfig,
    pub(crate) api_version: u32,
    pub(crate) bus: Arc<MessageBus>,
    pub(crate) store: Arc<dyn ConfigStore>,
    pub(crate) sink: Arc<dyn LogSink>,
    locator: ServiceLocator,
    state: RwLock<HostState>,
    registered: RwLock<Vec<Arc<ModuleEntry>>>,
    routable: ArcSwap<Vec<Arc<ModuleEntry>>>,
    cancellation: CancellationSignal,
    lifecycle: tokio::sync::Mutex<()>,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Builder for [`ModuleHost`]
pub struct HostBuilder {
    config: HostConfig,
    api_version: u32,
    store: Option<Arc<dyn ConfigStore>>,
    sink: Option<Arc<dyn LogSink>>,
    reserved: HashSet<TypeId>,
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self {
            config: HostConfig::default(),
            api_version: get_api_version(),
            store: None,
            sink: None,
            reserved: HashSet::new(),
        }
    }
}

impl HostBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// API version modules are checked against. Defaults to the version the
    /// crate was built with.
    pub fn api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Never hand out `T` through lookups, even if a module publishes it.
    pub fn reserve<T: ?Sized + 'static>(mut self) -> Self {
        self.reserved.insert(TypeId::of::<T>());
        self
    }

    pub fn build(self) -> HostResult<ModuleHost> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> ModuleHost {
        let inner = HostInner {
            config: self.config,
            api_version: self.api_version,
            bus: Arc::new(MessageBus::new()),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryConfigStore::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(LogFacadeSink::default())),
            locator: ServiceLocator::new(self.reserved),
            state: RwLock::new(HostState::Created),
            registered: RwLock::new(Vec::new()),
            routable: ArcSwap::from_pointee(Vec::new()),
            cancellation: CancellationSignal::new(),
            lifecycle: tokio::sync::Mutex::new(()),
        };
        ModuleHost {
            inner: Arc::new(inner),
        }
    }
}

/// In-process module host
///
/// Each value is an independent host; nothing is shared between hosts.
pub struct ModuleHost {
    inner: Arc<HostInner>,
}

impl Default for ModuleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHost {
    /// Host with default settings, an in-memory configuration store and the
    /// `log` facade as sink.
    pub fn new() -> Self {
        HostBuilder::default().assemble()
    }

    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }

    pub fn state(&self) -> HostState {
        self.inner.state()
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    pub fn api_version(&self) -> u32 {
        self.inner.api_version
    }

    /// The host's message bus; lifecycle events are published here.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.inner.bus
    }

    /// Construct a module and register it. See [`ModuleHost::register_shared`].
    pub async fn register<M, F>(&self, constructor: F) -> HostResult<ModuleId>
    where
        M: Module,
        F: FnOnce() -> M,
    {
        self.register_shared(Arc::new(constructor())).await
    }

    /// Register and initialize a module.
    ///
    /// The module becomes routable once `initialize` succeeds. If the host is
    /// already running it is post-initialized immediately; otherwise that
    /// happens in [`ModuleHost::start`].
    pub async fn register_shared(&self, module: Arc<dyn Module>) -> HostResult<ModuleId> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.register(module).await
    }

    /// Post-initialize every initialized module, in registration order.
    pub async fn start(&self) -> HostResult<LoadReport> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.start().await
    }

    /// Register every factory, continuing past failures, then start.
    pub async fn load<I>(&self, factories: I) -> HostResult<LoadReport>
    where
        I: IntoIterator<Item = ModuleFactory>,
    {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let mut registered = Vec::new();
        let mut failures = Vec::new();
        for factory in factories {
            match self.inner.register(factory()).await {
                Ok(id) => registered.push(id),
                Err(HostError::Load(failure)) => failures.push(failure),
                Err(HostError::DuplicateModule { module }) => {
                    let failure = LifecycleFailure::new(
                        &ModuleId::new(&module),
                        LifecyclePhase::Registration,
                        FailureReason::Error("a module with this name is already registered".to_string()),
                    );
                    self.inner.report_failure(&failure);
                    failures.push(failure);
                }
                Err(other) => return Err(other),
            }
        }

        let started = self.inner.start().await?;
        failures.extend(started.failures);

        let loaded = registered
            .into_iter()
            .filter(|id| self.inner.entry(id).map(|e| e.state()) == Some(ModuleState::PostInitialized))
            .collect();
        let report = LoadReport { loaded, failures };
        log::info!("{}", report);
        Ok(report)
    }

    /// Tear every module down in reverse registration order. Failures are
    /// recorded and do not stop the remaining teardown. Calling this again
    /// is a no-op.
    pub async fn shutdown(&self) -> ShutdownReport {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.shutdown().await
    }

    /// Routable modules, in registration order
    pub fn modules(&self) -> Vec<ModuleId> {
        self.inner.snapshot().iter().map(|e| e.id.clone()).collect()
    }

    pub fn module_state(&self, name: &str) -> Option<ModuleState> {
        self.inner.entry(&ModuleId::new(name)).map(|e| e.state())
    }

    /// Every registered module with its state, in registration order
    pub fn module_statuses(&self) -> Vec<ModuleStatus> {
        read_recover(&self.inner.registered, "registered modules")
            .iter()
            .map(|entry| ModuleStatus {
                info: entry.info.clone(),
                state: entry.state(),
                capabilities: entry.provider.capabilities().type_names(),
            })
            .collect()
    }

    /// Resolve a capability on behalf of the current caller context, as an
    /// external entry point would.
    pub fn resolve_one<C: ?Sized + Capability>(&self) -> Option<Attributed<C>> {
        self.inner
            .resolve(&Lookup::from_host(), Resolution::First)
            .into_iter()
            .next()
    }

    pub fn resolve_many<C: ?Sized + Capability>(&self) -> Vec<Attributed<C>> {
        self.inner.resolve(&Lookup::from_host(), Resolution::All)
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("state", &self.state())
            .field("modules", &self.modules())
            .finish()
    }
}

impl HostInner {
    pub(crate) fn state(&self) -> HostState {
        *read_recover(&self.state, "host state")
    }

    fn set_state(&self, state: HostState) {
        let mut current = write_recover(&self.state, "host state");
        log::debug!("Host: {} -> {}", *current, state);
        *current = state;
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<ModuleEntry>>> {
        self.routable.load_full()
    }

    fn entry(&self, id: &ModuleId) -> Option<Arc<ModuleEntry>> {
        read_recover(&self.registered, "registered modules")
            .iter()
            .find(|e| &e.id == id)
            .cloned()
    }

    fn add_routable(&self, entry: &Arc<ModuleEntry>) {
        self.routable.rcu(|routable| {
            let mut next = Vec::with_capacity(routable.len() + 1);
            next.extend(routable.iter().cloned());
            next.push(Arc::clone(entry));
            next
        });
    }

    fn remove_routable(&self, id: &ModuleId) {
        if self.routable.load().iter().any(|e| &e.id == id) {
            self.routable.rcu(|routable| {
                routable
                    .iter()
                    .filter(|e| &e.id != id)
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
    }

    pub(crate) fn resolve<C: ?Sized + Capability>(
        &self,
        lookup: &Lookup,
        resolution: Resolution,
    ) -> Vec<Attributed<C>> {
        if self.state() == HostState::Stopped {
            return Vec::new();
        }
        let snapshot = self.snapshot();
        self.locator
            .resolve(snapshot.iter().map(|e| &e.provider), lookup, resolution)
    }

    /// Storage section of a module's configuration
    pub(crate) fn module_section(&self, module: &ModuleId) -> String {
        format!("modules/{module}")
    }

    /// Storage section of a module's parameters
    pub(crate) fn parameter_section(&self, module: &ModuleId) -> String {
        format!("modules/{module}/parameters")
    }

    /// Write to the sink, splitting messages over the configured limit.
    pub(crate) fn write_log(&self, message: &str, severity: Severity, module: Option<&ModuleId>) {
        let header = module.map(|m| m.as_str());
        for part in split_message(message, self.config.log_message_limit) {
            self.sink.write(&part, severity, header);
        }
    }

    pub(crate) fn report_failure(&self, failure: &LifecycleFailure) {
        self.write_log(&failure.to_string(), Severity::Error, Some(&failure.module));
    }

    async fn publish_event<M: Message>(&self, event: M) {
        let report = CallerContext::external(self.bus.send(event)).await;
        if report.faulted > 0 {
            log::debug!("Lifecycle event delivery: {}", report);
        }
    }

    async fn register(self: &Arc<Self>, module: Arc<dyn Module>) -> HostResult<ModuleId> {
        let state = self.state();
        if !state.accepts_registration() {
            return Err(HostError::InvalidState {
                operation: "register modules",
                state,
            });
        }
        if state == HostState::Created {
            self.set_state(HostState::Loading);
        }

        let info = module.module_info();
        let id = ModuleId::new(&info.name);
        log::debug!("Registering module '{}' {}", id, info.version);

        if !module.is_compatible(self.api_version) {
            let failure = LifecycleFailure::new(
                &id,
                LifecyclePhase::Compatibility,
                FailureReason::Error(format!(
                    "built against API version {}, host provides {}",
                    info.api_version, self.api_version
                )),
            );
            self.report_failure(&failure);
            return Err(HostError::Load(failure));
        }

        {
            let mut registered = write_recover(&self.registered, "registered modules");
            if let Some(existing) = registered.iter().find(|e| e.id == id) {
                if existing.state() != ModuleState::Faulted {
                    return Err(HostError::DuplicateModule {
                        module: id.to_string(),
                    });
                }
            }
            registered.retain(|e| e.id != id);
        }

        let subscriptions = self.bus.attach(&id)?;
        let cancellation = self.cancellation.child();
        module.attach(ModuleHandle::new(
            id.clone(),
            Arc::downgrade(self),
            cancellation.clone(),
            subscriptions,
        ));

        let mut capabilities = CapabilitySet::new();
        Arc::clone(&module).publish(&mut capabilities);
        let withheld = capabilities.withhold(self.locator.reserved());
        if !withheld.is_empty() {
            log::warn!(
                "Module '{}' published reserved capabilities that will not be resolvable: {}",
                id,
                withheld.join(", ")
            );
        }
        let implicit = Arc::clone(&module).implicit_provider();

        let entry = Arc::new(ModuleEntry::new(
            info,
            module,
            Provider::new(id.clone(), capabilities, implicit),
            cancellation,
        ));
        write_recover(&self.registered, "registered modules").push(Arc::clone(&entry));

        if let Err(failure) = self.configure(&entry) {
            self.fault(&entry, &failure).await;
            return Err(HostError::Load(failure));
        }

        entry.set_state(ModuleState::Initializing);
        if let Err(reason) = self.run_phase(&entry, LifecyclePhase::Initialize).await {
            let failure = LifecycleFailure::new(&id, LifecyclePhase::Initialize, reason);
            self.fault(&entry, &failure).await;
            return Err(HostError::Load(failure));
        }
        entry.set_state(ModuleState::Initialized);
        self.add_routable(&entry);
        log::info!("Module '{}' initialized", id);

        if self.state() == HostState::Running {
            self.post_initialize(&entry).await.map_err(HostError::Load)?;
        }
        Ok(id)
    }

    /// Load stored configuration and hand it to the module.
    fn configure(&self, entry: &ModuleEntry) -> Result<(), LifecycleFailure> {
        if !entry.module.configuration_section() {
            return Ok(());
        }
        let failed = |reason: String| {
            LifecycleFailure::new(
                &entry.id,
                LifecyclePhase::Configuration,
                FailureReason::Error(reason),
            )
        };

        let stored = self
            .store
            .get(
                &self.config.config_root,
                &self.module_section(&entry.id),
                "configuration",
            )
            .map_err(|e| failed(format_error(&e, true)))?;

        let Some(configuration) = stored else {
            log::debug!("No stored configuration for module '{}'", entry.id);
            return Ok(());
        };

        CallerContext::sync_scope(Some(entry.id.clone()), || {
            entry.module.apply_configuration(configuration)
        })
        .map_err(|e| failed(format_error(&e, true)))
    }

    async fn post_initialize(&self, entry: &Arc<ModuleEntry>) -> Result<(), LifecycleFailure> {
        entry.set_state(ModuleState::PostInitializing);
        match self.run_phase(entry, LifecyclePhase::PostInitialize).await {
            Ok(()) => {
                entry.set_state(ModuleState::PostInitialized);
                log::info!("Module '{}' running", entry.id);
                self.publish_event(ModuleLoaded {
                    module: entry.id.clone(),
                    info: entry.info.clone(),
                })
                .await;
                Ok(())
            }
            Err(reason) => {
                let failure = LifecycleFailure::new(&entry.id, LifecyclePhase::PostInitialize, reason);
                self.fault(entry, &failure).await;
                if let Err(reason) = self.run_phase(entry, LifecyclePhase::Uninitialize).await {
                    log::warn!(
                        "Cleanup of faulted module '{}' also failed: {}",
                        entry.id,
                        reason
                    );
                }
                Err(failure)
            }
        }
    }

    /// Take a module out of service after a load failure.
    async fn fault(&self, entry: &ModuleEntry, failure: &LifecycleFailure) {
        entry.set_state(ModuleState::Faulted);
        self.remove_routable(&entry.id);
        entry.cancellation.cancel();
        self.bus.clear_module(&entry.id);
        self.report_failure(failure);
        self.publish_event(ModuleFaulted {
            failure: failure.clone(),
        })
        .await;
    }

    async fn start(&self) -> HostResult<LoadReport> {
        match self.state() {
            HostState::Created | HostState::Loading => {}
            HostState::Running => return Ok(LoadReport::default()),
            state => {
                return Err(HostError::InvalidState {
                    operation: "start",
                    state,
                })
            }
        }
        self.set_state(HostState::Starting);

        let pending: Vec<_> = read_recover(&self.registered, "registered modules")
            .iter()
            .filter(|e| e.state() == ModuleState::Initialized)
            .cloned()
            .collect();

        let mut report = LoadReport::default();
        for entry in pending {
            match self.post_initialize(&entry).await {
                Ok(()) => report.loaded.push(entry.id.clone()),
                Err(failure) => report.failures.push(failure),
            }
        }

        self.set_state(HostState::Running);
        Ok(report)
    }

    async fn shutdown(&self) -> ShutdownReport {
        if self.state() == HostState::Stopped {
            return ShutdownReport {
                already_stopped: true,
                ..ShutdownReport::default()
            };
        }
        self.set_state(HostState::Stopping);

        let entries: Vec<_> = read_recover(&self.registered, "registered modules")
            .iter()
            .rev()
            .cloned()
            .collect();

        let mut report = ShutdownReport::default();
        for entry in entries {
            if !entry.state().needs_teardown() {
                continue;
            }

            self.remove_routable(&entry.id);
            entry.cancellation.cancel();
            self.bus.clear_module(&entry.id);

            entry.set_state(ModuleState::Uninitializing);
            let clean = match self.run_phase(&entry, LifecyclePhase::Uninitialize).await {
                Ok(()) => true,
                Err(reason) => {
                    let failure =
                        LifecycleFailure::new(&entry.id, LifecyclePhase::Uninitialize, reason);
                    self.report_failure(&failure);
                    report.failures.push(failure);
                    false
                }
            };
            entry.set_state(ModuleState::Uninitialized);
            report.unloaded.push(entry.id.clone());
            log::info!("Module '{}' unloaded", entry.id);

            self.publish_event(ModuleUnloaded {
                module: entry.id.clone(),
                clean,
            })
            .await;
        }

        self.cancellation.cancel();
        self.set_state(HostState::Stopped);
        log::info!("{}", report);
        report
    }

    fn phase_timeout(&self, entry: &ModuleEntry, phase: LifecyclePhase) -> Duration {
        match phase {
            LifecyclePhase::Initialize => entry
                .module
                .initialize_timeout()
                .unwrap_or_else(|| self.config.initialize_timeout()),
            LifecyclePhase::PostInitialize => self.config.post_initialize_timeout(),
            _ => self.config.uninitialize_timeout(),
        }
    }

    /// Run one lifecycle callback on a pool task as the module itself,
    /// bounded by the phase timeout.
    async fn run_phase(&self, entry: &ModuleEntry, phase: LifecyclePhase) -> Result<(), FailureReason> {
        let limit = self.phase_timeout(entry, phase);
        let module = Arc::clone(&entry.module);
        let callback = async move {
            match phase {
                LifecyclePhase::Initialize => module.initialize().await,
                LifecyclePhase::PostInitialize => module.post_initialize().await,
                LifecyclePhase::Uninitialize => module.uninitialize().await,
                _ => Ok(()),
            }
        };

        let mut task = tokio::spawn(CallerContext::scope(Some(entry.id.clone()), callback));
        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(FailureReason::Error(format_error(&e, true))),
            Ok(Err(e)) if e.is_panic() => Err(FailureReason::Panicked(panic_message(e.into_panic()))),
            Ok(Err(e)) => Err(FailureReason::Error(e.to_string())),
            Err(_) => {
                task.abort();
                Err(FailureReason::TimedOut(limit))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
