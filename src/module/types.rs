//! Type definitions for modules
//!
//! Metadata, lifecycle states and the phases a load or teardown failure is
//! reported against.

use std::fmt;
use strum_macros::EnumIter;

/// Module metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Unique name within a host; becomes the module's `ModuleId`
    pub name: String,
    pub version: String,
    pub description: String,
    /// API version the module was built against
    pub api_version: u32,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, api_version: u32) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            api_version,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Lifecycle state of a registered module
///
/// Only the host moves a module between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ModuleState {
    Created,
    Initializing,
    Initialized,
    PostInitializing,
    /// Fully started
    PostInitialized,
    Uninitializing,
    Uninitialized,
    /// Failed a load phase; never routable again
    Faulted,
}

impl ModuleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::PostInitializing => "post-initializing",
            Self::PostInitialized => "running",
            Self::Uninitializing => "uninitializing",
            Self::Uninitialized => "uninitialized",
            Self::Faulted => "faulted",
        }
    }

    /// True for states in which the module's `Uninitialize` must run at
    /// shutdown.
    pub(crate) fn needs_teardown(&self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::PostInitializing | Self::PostInitialized
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Step of the lifecycle a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum LifecyclePhase {
    Registration,
    Compatibility,
    Configuration,
    Initialize,
    PostInitialize,
    Uninitialize,
}

impl LifecyclePhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registration => "Registration",
            Self::Compatibility => "Compatibility",
            Self::Configuration => "Configuration",
            Self::Initialize => "Initialize",
            Self::PostInitialize => "PostInitialize",
            Self::Uninitialize => "Uninitialize",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
