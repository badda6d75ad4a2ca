//! Errands: named, scripted operations bound to a release.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::inputs::{ExtraVars, OverlayInputs};
use crate::runner::{BoxedRunner, Runner, runner_fn};
use crate::script::{DEFAULT_KILL_GRACE, ScriptStep};
use crate::state::Stage;

/// The two things a runner needs to know about an errand.
pub trait Errand: Send + Sync {
    fn name(&self) -> &str;
    fn script(&self) -> &Path;
}

impl<E: Errand + ?Sized> Errand for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn script(&self) -> &Path {
        (**self).script()
    }
}

/// An errand as declared in release metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrandDef {
    /// Filled from the metadata map key when loaded from a release.
    #[serde(default)]
    pub name: String,
    /// Script path, relative to the release root.
    pub script: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ErrandDef {
    pub fn new(name: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Errand for ErrandDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn script(&self) -> &Path {
        &self.script
    }
}

/// Build a runner for `errand`.
///
/// Every run builds a fresh relocatable [`ScriptStep`] for the `deploy`
/// stage. Its inputs are the deployment's calculated deploy inputs with
/// `extra_vars` layered on top; extra variables win on collision and the
/// deployment state itself is never modified.
pub fn errand_runner<E>(errand: E, extra_vars: ExtraVars) -> BoxedRunner
where
    E: Errand + 'static,
{
    errand_runner_with_grace(errand, extra_vars, DEFAULT_KILL_GRACE)
}

/// Like [`errand_runner`], with a custom SIGTERM-to-SIGKILL grace period for
/// cancelled runs.
pub fn errand_runner_with_grace<E>(
    errand: E,
    extra_vars: ExtraVars,
    kill_grace: Duration,
) -> BoxedRunner
where
    E: Errand + 'static,
{
    let errand = Arc::new(errand);
    let overlay = OverlayInputs::new(extra_vars);

    Box::new(runner_fn(move |ctx| {
        let errand = errand.clone();
        let overlay = overlay.clone();
        Box::pin(async move {
            tracing::info!(errand = %errand.name(), "Running errand");
            let step = ScriptStep::new(Stage::Deploy, errand.name(), true, errand.script())?
                .with_inputs(overlay)
                .with_kill_grace(kill_grace);
            step.run(ctx).await
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunnerContext;
    use crate::error::RunnerError;
    use crate::output::OutputSink;
    use crate::state::DeploymentState;

    #[test]
    fn test_errand_def_implements_errand() {
        let errand = ErrandDef::new("backup", "scripts/backup.sh").with_description("Dump the db");
        assert_eq!(errand.name(), "backup");
        assert_eq!(errand.script(), Path::new("scripts/backup.sh"));

        let shared: Arc<dyn Errand> = Arc::new(errand);
        assert_eq!(shared.name(), "backup");
    }

    #[test]
    fn test_errand_def_deserialize() {
        let errand: ErrandDef =
            serde_json::from_str(r#"{"script": "errands/migrate.sh", "description": "Migrate"}"#)
                .unwrap();
        assert!(errand.name.is_empty());
        assert_eq!(errand.script, PathBuf::from("errands/migrate.sh"));
        assert_eq!(errand.description, "Migrate");
    }

    #[tokio::test]
    async fn test_empty_script_fails_before_inputs() {
        let runner = errand_runner(ErrandDef::new("broken", ""), ExtraVars::new());
        let ctx = RunnerContext::new(Arc::new(DeploymentState::new()), ".")
            .with_output(OutputSink::Discard);

        let err = runner.run(&ctx).await.unwrap_err();
        assert!(matches!(err, RunnerError::InvalidStep { .. }));
    }
}
