//! Host lifecycle states

use std::fmt;

/// Lifecycle state of a [`ModuleHost`](crate::host::api::ModuleHost)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// No module registered yet
    Created,
    /// Modules are being registered and initialized
    Loading,
    /// Initialized modules are being post-initialized
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl HostState {
    /// True when new modules may still be registered
    pub fn accepts_registration(&self) -> bool {
        matches!(self, Self::Created | Self::Loading | Self::Running)
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Loading => "loading",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
