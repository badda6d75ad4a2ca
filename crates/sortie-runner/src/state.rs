//! Deployment state: the read-only source of calculated inputs.
//!
//! The runner layer never computes variables itself. It asks a
//! [`StateAccessor`] for the calculated inputs of a [`Stage`] and treats the
//! returned snapshot as immutable.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Default deployment state filename, looked up in the working directory.
pub const DEPLOYMENT_STATE_FILE: &str = "deployment.json";

/// Resolved variable bindings handed to a script, ordered by key.
pub type Inputs = BTreeMap<String, serde_json::Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Stage
// ─────────────────────────────────────────────────────────────────────────────

/// Which bucket of calculated inputs applies to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Deploy,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Stage::Build),
            "deploy" => Ok(Stage::Deploy),
            other => Err(format!("unknown stage '{}' (expected build or deploy)", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accessor
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of a deployment's calculated inputs.
///
/// Implementations must be side-effect free and return the same snapshot for
/// repeated calls within one run. The snapshot is shared, so callers that
/// need to change it copy it first.
pub trait StateAccessor: Send + Sync {
    fn calculated_inputs(&self, stage: Stage) -> Result<Arc<Inputs>, StateError>;
}

impl<S: StateAccessor + ?Sized> StateAccessor for Arc<S> {
    fn calculated_inputs(&self, stage: Stage) -> Result<Arc<Inputs>, StateError> {
        (**self).calculated_inputs(stage)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DeploymentState
// ─────────────────────────────────────────────────────────────────────────────

/// Calculated inputs for a single deployment, keyed by stage.
///
/// ```json
/// {
///   "stages": {
///     "deploy": { "host": "db.internal", "replicas": 3 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentState {
    #[serde(default)]
    stages: BTreeMap<Stage, Arc<Inputs>>,
}

impl DeploymentState {
    /// Create a state with no stages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the calculated inputs for a stage.
    pub fn with_stage(mut self, stage: Stage, inputs: Inputs) -> Self {
        self.stages.insert(stage, Arc::new(inputs));
        self
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON state file.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let contents = std::fs::read_to_string(path).map_err(|e| StateError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let state = Self::from_json(&contents)?;
        tracing::debug!(
            path = %path.display(),
            stages = state.stages.len(),
            "Loaded deployment state"
        );
        Ok(state)
    }

    /// Stages that have calculated inputs.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.keys().copied()
    }
}

impl StateAccessor for DeploymentState {
    fn calculated_inputs(&self, stage: Stage) -> Result<Arc<Inputs>, StateError> {
        self.stages
            .get(&stage)
            .cloned()
            .ok_or(StateError::StageMissing(stage))
    }
}
