//! Module Trait
//!
//! The host drives every module through the same lifecycle:
//!
//! 1. `module_info` and `is_compatible` are checked at registration
//! 2. `attach` hands the module its [`ModuleHandle`]
//! 3. `publish` and `implicit_provider` describe what it offers others
//! 4. `apply_configuration` receives stored configuration, if any
//! 5. `initialize`, then `post_initialize` once every module is initialized
//! 6. `uninitialize` at shutdown
//!
//! Lifecycle callbacks run on pool tasks with the caller context set to the
//! module itself. Modules are shared (`Arc<dyn Module>`), so state that
//! changes after registration lives behind interior mutability.

use crate::config::api::ConfigValue;
use crate::core::version::major_version;
use crate::module::capability::{CapabilitySet, ImplicitProvider};
use crate::module::error::ModuleResult;
use crate::module::handle::ModuleHandle;
use crate::module::types::ModuleInfo;
use std::sync::Arc;
use std::time::Duration;

#[async_trait::async_trait]
pub trait Module: Send + Sync + 'static {
    /// Get module metadata
    fn module_info(&self) -> ModuleInfo;

    /// Check if this module can run against the host's API version
    ///
    /// The default accepts hosts of the same major version that are not
    /// older than the version the module was built against.
    fn is_compatible(&self, host_api_version: u32) -> bool {
        let required = self.module_info().api_version;
        major_version(required) == major_version(host_api_version) && required <= host_api_version
    }

    /// Receive the capability handle. Called exactly once, before any other
    /// lifecycle callback.
    fn attach(&self, handle: ModuleHandle);

    /// Publish the capabilities this module offers to other modules.
    fn publish(self: Arc<Self>, capabilities: &mut CapabilitySet) {
        let _ = capabilities;
    }

    /// On-demand provider queried for capabilities not in the published set.
    fn implicit_provider(self: Arc<Self>) -> Option<Arc<dyn ImplicitProvider>> {
        None
    }

    /// Initialize timeout overriding the host default.
    fn initialize_timeout(&self) -> Option<Duration> {
        None
    }

    /// True when the module has a configuration section the host should
    /// load and pass to [`Module::apply_configuration`] before `initialize`.
    fn configuration_section(&self) -> bool {
        false
    }

    /// Apply configuration loaded from the store.
    fn apply_configuration(&self, configuration: ConfigValue) -> ModuleResult<()> {
        let _ = configuration;
        Ok(())
    }

    async fn initialize(&self) -> ModuleResult<()>;

    /// Called after every module has been initialized; other modules can be
    /// resolved from here on.
    async fn post_initialize(&self) -> ModuleResult<()> {
        Ok(())
    }

    async fn uninitialize(&self) -> ModuleResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Versioned {
        api_version: u32,
    }

    #[async_trait::async_trait]
    impl Module for Versioned {
        fn module_info(&self) -> ModuleInfo {
            ModuleInfo::new("versioned", "0.1.0", self.api_version)
        }

        fn attach(&self, _handle: ModuleHandle) {}

        async fn initialize(&self) -> ModuleResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_compatibility() {
        let module = Versioned {
            api_version: 20250101,
        };
        assert!(module.is_compatible(20250101));
        assert!(module.is_compatible(20250727));
        assert!(!module.is_compatible(20241231));
        assert!(!module.is_compatible(20260101));
    }

    #[tokio::test]
    async fn test_default_callbacks_succeed() {
        let module = Arc::new(Versioned {
            api_version: 20250101,
        });
        assert!(module.post_initialize().await.is_ok());
        assert!(module.uninitialize().await.is_ok());
        assert!(module.initialize_timeout().is_none());
        assert!(!module.configuration_section());

        let mut capabilities = CapabilitySet::new();
        module.clone().publish(&mut capabilities);
        assert!(capabilities.is_empty());
        assert!(module.implicit_provider().is_none());
    }
}
