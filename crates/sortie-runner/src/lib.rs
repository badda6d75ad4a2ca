//! Step execution framework for Sortie.
//!
//! Turns a declarative errand (a named script bound to a release) into an
//! executable unit:
//!
//! - [`Runner`]: the single `run(ctx)` capability everything composes over
//! - [`RunnerContext`]: deployment state, working directory, output sink and
//!   cancellation for one invocation
//! - [`ScriptStep`]: resolves inputs, launches a script, relays its output
//!   and checks its exit status
//! - [`errand_runner`]: binds an [`Errand`] to a deploy-stage script step with
//!   an extra-variable overlay
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sortie_runner::{DeploymentState, ErrandDef, ExtraVars, Runner, RunnerContext, errand_runner};
//!
//! # async fn example() -> sortie_runner::Result<()> {
//! let state = DeploymentState::load("deployment.json".as_ref()).expect("state");
//! let ctx = RunnerContext::new(Arc::new(state), "/srv/releases/postgres-1.4.0");
//!
//! let mut extra = ExtraVars::new();
//! extra.insert("target".to_string(), "s3://backups".to_string());
//!
//! errand_runner(ErrandDef::new("backup", "errands/backup.sh"), extra)
//!     .run(&ctx)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod errand;
pub mod error;
pub mod inputs;
pub mod output;
pub mod package;
pub mod runner;
pub mod script;
pub mod state;

pub use context::{ProcessLauncher, RunnerContext, SystemLauncher};
pub use errand::{Errand, ErrandDef, errand_runner, errand_runner_with_grace};
pub use error::{PackageError, Result, RunnerError, StateError};
pub use inputs::{CalculatedInputs, ExtraVars, InputResolver, OverlayInputs, merge_inputs};
pub use output::{OutputChunk, OutputSink, OutputStream};
pub use package::{RELEASE_METADATA_FILE, ReleaseMetadata};
pub use runner::{BoxedRunner, FnRunner, Runner, Sequence, runner_fn};
pub use script::{DEFAULT_KILL_GRACE, INPUTS_ENV, STAGE_ENV, STEP_ENV, ScriptStep};
pub use state::{DEPLOYMENT_STATE_FILE, DeploymentState, Inputs, Stage, StateAccessor};
