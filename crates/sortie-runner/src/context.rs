//! Execution context threaded through every runner.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::output::OutputSink;
use crate::state::StateAccessor;

// ─────────────────────────────────────────────────────────────────────────────
// Process launching
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns subprocesses on behalf of script steps.
///
/// Every subprocess the framework starts goes through this seam, which makes
/// it possible to observe (or forbid) launches from tests.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &mut Command) -> std::io::Result<Child>;
}

/// Launcher that spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, command: &mut Command) -> std::io::Result<Child> {
        command.spawn()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RunnerContext
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to runners during execution.
///
/// Created once per invocation and passed by reference; runners never mutate
/// it. Cloning is cheap and shares the state, sink and cancellation token.
#[derive(Clone)]
pub struct RunnerContext {
    deployment_state: Arc<dyn StateAccessor>,
    working_dir: PathBuf,
    output: OutputSink,
    cancellation: CancellationToken,
    launcher: Arc<dyn ProcessLauncher>,
}

impl RunnerContext {
    /// Create a context over a deployment state and working directory.
    pub fn new(deployment_state: Arc<dyn StateAccessor>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            deployment_state,
            working_dir: working_dir.into(),
            output: OutputSink::default(),
            cancellation: CancellationToken::new(),
            launcher: Arc::new(SystemLauncher),
        }
    }

    /// Relay subprocess output to `sink`.
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.output = sink;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Spawn subprocesses through `launcher`.
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn deployment_state(&self) -> &dyn StateAccessor {
        self.deployment_state.as_ref()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn launcher(&self) -> &dyn ProcessLauncher {
        self.launcher.as_ref()
    }

    /// Check if execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl fmt::Debug for RunnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerContext")
            .field("working_dir", &self.working_dir)
            .field("output", &self.output)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DeploymentState, Stage};

    #[test]
    fn test_context_defaults() {
        let ctx = RunnerContext::new(Arc::new(DeploymentState::new()), "/srv/app");
        assert_eq!(ctx.working_dir(), Path::new("/srv/app"));
        assert!(matches!(ctx.output(), OutputSink::Inherit));
        assert!(!ctx.is_cancelled());
        assert!(ctx.deployment_state().calculated_inputs(Stage::Deploy).is_err());
    }

    #[test]
    fn test_clone_shares_cancellation() {
        let token = CancellationToken::new();
        let ctx = RunnerContext::new(Arc::new(DeploymentState::new()), ".")
            .with_cancellation(token.clone())
            .with_output(OutputSink::Discard);
        let cloned = ctx.clone();

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(cloned.is_cancelled());
        assert!(format!("{:?}", ctx).contains("cancelled: true"));
    }
}
