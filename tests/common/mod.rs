//! Common test modules built only on the public API

use modhost::context::api::CallerContext;
use modhost::core::version::get_api_version;
use modhost::messaging::api::{Filter, Handler};
use modhost::module::api::{
    CapabilitySet, HandleSlot, Module, ModuleError, ModuleHandle, ModuleInfo, ModuleResult,
};
use std::sync::{Arc, Mutex};

/// Base view of every link event
pub trait Event: Send + Sync {
    fn code(&self) -> u32;
}

/// Event published when a link drops
pub struct LinkDown {
    pub code: u32,
}

impl Event for LinkDown {
    fn code(&self) -> u32 {
        self.code
    }
}

modhost::message!(LinkDown: dyn Event);

/// Capability offered by sensors
pub trait Thermometer: Send + Sync {
    fn celsius(&self) -> f64;

    /// Module the sensor believes it is serving
    fn serving(&self) -> Option<String>;
}

modhost::capability!(dyn Thermometer);

pub struct Sensor {
    name: String,
    reading: f64,
    fail_initialize: bool,
    handle: HandleSlot,
    /// Runs in post_initialize with the sensor's handle
    on_initialize: Option<Box<dyn Fn(&ModuleHandle) + Send + Sync>>,
}

impl Sensor {
    pub fn new(name: &str, reading: f64) -> Self {
        Self {
            name: name.to_string(),
            reading,
            fail_initialize: false,
            handle: HandleSlot::new(),
            on_initialize: None,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn with_initializer(mut self, on_initialize: impl Fn(&ModuleHandle) + Send + Sync + 'static) -> Self {
        self.on_initialize = Some(Box::new(on_initialize));
        self
    }
}

impl Thermometer for Sensor {
    fn celsius(&self) -> f64 {
        self.reading
    }

    fn serving(&self) -> Option<String> {
        CallerContext::current().map(|c| c.to_string())
    }
}

#[async_trait::async_trait]
impl Module for Sensor {
    fn module_info(&self) -> ModuleInfo {
        ModuleInfo::new(&self.name, "1.0.0", get_api_version())
    }

    fn attach(&self, handle: ModuleHandle) {
        self.handle.set(handle);
    }

    fn publish(self: Arc<Self>, capabilities: &mut CapabilitySet) {
        capabilities.provide::<dyn Thermometer>(self);
    }

    async fn initialize(&self) -> ModuleResult<()> {
        if self.fail_initialize {
            return Err(ModuleError::failed("sensor hardware missing"));
        }
        Ok(())
    }

    async fn post_initialize(&self) -> ModuleResult<()> {
        if let Some(on_initialize) = &self.on_initialize {
            on_initialize(self.handle.get()?);
        }
        Ok(())
    }
}

/// Module recording the codes of the link events it receives
pub struct Listener {
    name: String,
    only_code: Option<u32>,
    handle: HandleSlot,
    pub received: Arc<Mutex<Vec<u32>>>,
}

impl Listener {
    pub fn new(name: &str, only_code: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            only_code,
            handle: HandleSlot::new(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn codes(&self) -> Vec<u32> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Module for Listener {
    fn module_info(&self) -> ModuleInfo {
        ModuleInfo::new(&self.name, "1.0.0", get_api_version())
    }

    fn attach(&self, handle: ModuleHandle) {
        self.handle.set(handle);
    }

    async fn initialize(&self) -> ModuleResult<()> {
        let received = Arc::clone(&self.received);
        let handler = Handler::<dyn Event>::from_fn(move |event| {
            received.lock().unwrap().push(event.code());
            Ok(())
        });
        let filter = self
            .only_code
            .map(|code| Filter::<dyn Event>::new(move |event| event.code() == code));
        self.handle.get()?.subscribe(handler, filter)?;
        Ok(())
    }
}
