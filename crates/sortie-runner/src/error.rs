//! Error types for the runner crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::Stage;

/// Result type alias using the runner error type.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors surfaced by [`Runner::run`](crate::Runner::run).
///
/// Nothing here is retried. A failed script is reported as-is because its
/// side effects are not assumed to be idempotent.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The step was misconfigured and never reached the launcher.
    #[error("invalid step '{step}': {reason}")]
    InvalidStep { step: String, reason: String },

    /// The calculated inputs for the step's stage could not be resolved.
    #[error("failed to resolve {stage} inputs for step '{step}': {source}")]
    InputResolution {
        step: String,
        stage: Stage,
        #[source]
        source: StateError,
    },

    /// The script does not exist or is not executable.
    #[error("script for step '{step}' not found or not executable: {}", path.display())]
    ScriptNotFound { step: String, path: PathBuf },

    /// The script exists but the process could not be spawned.
    #[error("failed to launch script for step '{step}': {source}")]
    Launch {
        step: String,
        #[source]
        source: std::io::Error,
    },

    /// The script ran and exited non-zero.
    #[error("step '{step}' failed with exit code {exit_code}")]
    ScriptExecution { step: String, exit_code: i32 },

    /// The caller cancelled the run.
    #[error("step '{step}' was cancelled")]
    Cancelled { step: String },
}

impl RunnerError {
    /// True when the run was aborted by the caller rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunnerError::Cancelled { .. })
    }

    /// Exit code reported by the script, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunnerError::ScriptExecution { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Name of the step the error is attributed to.
    pub fn step(&self) -> &str {
        match self {
            RunnerError::InvalidStep { step, .. }
            | RunnerError::InputResolution { step, .. }
            | RunnerError::ScriptNotFound { step, .. }
            | RunnerError::Launch { step, .. }
            | RunnerError::ScriptExecution { step, .. }
            | RunnerError::Cancelled { step } => step,
        }
    }
}

/// Errors raised by a [`StateAccessor`](crate::StateAccessor).
#[derive(Debug, Error)]
pub enum StateError {
    /// The deployment state has no bucket for the stage.
    #[error("deployment state has no entry for stage '{0}'")]
    StageMissing(Stage),

    /// A variable in the stage could not be resolved. Returned by external
    /// [`StateAccessor`](crate::StateAccessor) implementations and custom
    /// input resolvers; the file-backed `DeploymentState` never does.
    #[error("unresolved inputs for stage '{stage}': {reason}")]
    Unresolved { stage: Stage, reason: String },

    /// Failed to read a state file.
    #[error("failed to read state file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse deployment state.
    #[error("failed to parse deployment state: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while loading package metadata.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Failed to read the metadata file.
    #[error("failed to read release metadata '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse the metadata.
    #[error("failed to parse release metadata: {0}")]
    Parse(#[from] serde_json::Error),

    /// An errand declaration is unusable.
    #[error("invalid errand '{name}': {reason}")]
    InvalidErrand { name: String, reason: String },

    /// No errand with that name exists in the release.
    #[error("errand '{name}' not found in release '{release}'")]
    ErrandNotFound { name: String, release: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RunnerError::ScriptExecution {
            step: "backup".to_string(),
            exit_code: 3,
        };
        assert_eq!(err.to_string(), "step 'backup' failed with exit code 3");

        let err = RunnerError::InputResolution {
            step: "backup".to_string(),
            stage: Stage::Deploy,
            source: StateError::StageMissing(Stage::Deploy),
        };
        assert!(err.to_string().contains("deploy inputs"));
        assert!(err.to_string().contains("no entry for stage 'deploy'"));
    }

    #[test]
    fn test_error_accessors() {
        let cancelled = RunnerError::Cancelled {
            step: "migrate".to_string(),
        };
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.exit_code(), None);
        assert_eq!(cancelled.step(), "migrate");

        let failed = RunnerError::ScriptExecution {
            step: "migrate".to_string(),
            exit_code: 42,
        };
        assert!(!failed.is_cancelled());
        assert_eq!(failed.exit_code(), Some(42));
    }
}
