//! Load and shutdown reports

use crate::context::api::ModuleId;
use crate::module::types::LifecyclePhase;
use std::fmt;
use std::time::Duration;

/// Why a lifecycle step failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The callback returned an error
    Error(String),
    /// The callback panicked
    Panicked(String),
    /// The callback did not finish in time
    TimedOut(Duration),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Error(message) => write!(f, "error: {message}"),
            FailureReason::Panicked(message) => write!(f, "panic: {message}"),
            FailureReason::TimedOut(limit) => write!(f, "timed out after {limit:?}"),
        }
    }
}

/// A module that failed a lifecycle step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleFailure {
    pub module: ModuleId,
    pub phase: LifecyclePhase,
    pub reason: FailureReason,
}

impl LifecycleFailure {
    pub fn new(module: &ModuleId, phase: LifecyclePhase, reason: FailureReason) -> Self {
        Self {
            module: module.clone(),
            phase,
            reason,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, FailureReason::TimedOut(_))
    }
}

impl fmt::Display for LifecycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module '{}' failed in {}: {}",
            self.module, self.phase, self.reason
        )
    }
}

impl std::error::Error for LifecycleFailure {}

/// Outcome of [`ModuleHost::load`](crate::host::api::ModuleHost::load)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Modules that reached the running state, in registration order
    pub loaded: Vec<ModuleId>,
    pub failures: Vec<LifecycleFailure>,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_for(&self, module: &str) -> Option<&LifecycleFailure> {
        self.failures.iter().find(|f| f.module == module)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} module(s) loaded, {} failed",
            self.loaded.len(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

/// Outcome of [`ModuleHost::shutdown`](crate::host::api::ModuleHost::shutdown)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Modules torn down, in teardown order
    pub unloaded: Vec<ModuleId>,
    pub failures: Vec<LifecycleFailure>,
    /// The host had already been shut down; nothing was done
    pub already_stopped: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.already_stopped {
            return write!(f, "host already stopped");
        }
        write!(
            f,
            "{} module(s) unloaded, {} teardown failure(s)",
            self.unloaded.len(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_names_module_phase_and_reason() {
        let failure = LifecycleFailure::new(
            &ModuleId::new("m2"),
            LifecyclePhase::Initialize,
            FailureReason::TimedOut(Duration::from_millis(50)),
        );
        let rendered = failure.to_string();
        assert!(rendered.contains("'m2'"));
        assert!(rendered.contains("Initialize"));
        assert!(rendered.contains("timed out after 50ms"));
        assert!(failure.is_timeout());
    }

    #[test]
    fn test_load_report_lookup() {
        let report = LoadReport {
            loaded: vec![ModuleId::new("m1")],
            failures: vec![LifecycleFailure::new(
                &ModuleId::new("m2"),
                LifecyclePhase::PostInitialize,
                FailureReason::Error("no database".to_string()),
            )],
        };
        assert!(!report.is_success());
        assert!(report.failure_for("m2").is_some());
        assert!(report.failure_for("m1").is_none());
        assert!(report.to_string().contains("1 module(s) loaded, 1 failed"));
    }
}
