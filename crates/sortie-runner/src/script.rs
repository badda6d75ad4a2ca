//! Script steps: run an executable with resolved inputs.
//!
//! ## Scripting contract
//!
//! A script launched by a [`ScriptStep`] receives its inputs through the
//! environment:
//!
//! - `SORTIE_INPUTS`: the complete input mapping as a JSON object.
//! - One variable per input whose key is a valid variable name. String values
//!   are passed verbatim, other values as compact JSON. Inputs that cannot be
//!   carried in the environment are only available through `SORTIE_INPUTS`.
//! - `SORTIE_STAGE` and `SORTIE_STEP`.
//!
//! stdin is closed. stdout and stderr are relayed live to the context's
//! output sink. Exit code 0 is success; anything else fails the step.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::context::RunnerContext;
use crate::error::{Result, RunnerError};
use crate::inputs::{CalculatedInputs, InputResolver};
use crate::output::{OutputStream, relay};
use crate::runner::Runner;
use crate::state::{Inputs, Stage};

/// Environment variable carrying the full input mapping as JSON.
pub const INPUTS_ENV: &str = "SORTIE_INPUTS";

/// Environment variable carrying the step's stage.
pub const STAGE_ENV: &str = "SORTIE_STAGE";

/// Environment variable carrying the step's name.
pub const STEP_ENV: &str = "SORTIE_STEP";

/// Default time a cancelled script gets between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long output relays may keep draining after the script itself exits.
/// Background processes the script left behind can hold the pipes open.
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A runner that executes one script against a resolved set of inputs.
pub struct ScriptStep {
    stage: Stage,
    step_name: String,
    relocatable: bool,
    script_path: PathBuf,
    inputs: Box<dyn InputResolver>,
    kill_grace: Duration,
}

impl ScriptStep {
    /// Create a step that reads the calculated inputs of `stage` unchanged.
    ///
    /// Fails with [`RunnerError::InvalidStep`] if `script_path` is empty.
    ///
    /// Relocatable steps run with the context's working directory as their
    /// cwd. Non-relocatable steps run from the directory containing the
    /// script.
    pub fn new(
        stage: Stage,
        step_name: impl Into<String>,
        relocatable: bool,
        script_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let step_name = step_name.into();
        let script_path = script_path.into();
        if script_path.as_os_str().is_empty() {
            return Err(RunnerError::InvalidStep {
                step: step_name,
                reason: "script path is empty".to_string(),
            });
        }

        Ok(Self {
            stage,
            step_name,
            relocatable,
            script_path,
            inputs: Box::new(CalculatedInputs),
            kill_grace: DEFAULT_KILL_GRACE,
        })
    }

    /// Replace the input resolution strategy.
    pub fn with_inputs(mut self, resolver: impl InputResolver + 'static) -> Self {
        self.inputs = Box::new(resolver);
        self
    }

    /// Set the grace period between SIGTERM and SIGKILL on cancellation.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn is_relocatable(&self) -> bool {
        self.relocatable
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Resolve the script against the working directory and check that it
    /// can be executed.
    fn resolve_script(&self, ctx: &RunnerContext) -> Result<PathBuf> {
        let joined = if self.script_path.is_absolute() {
            self.script_path.clone()
        } else {
            ctx.working_dir().join(&self.script_path)
        };

        let not_found = |path: PathBuf| RunnerError::ScriptNotFound {
            step: self.step_name.clone(),
            path,
        };

        let path = std::path::absolute(&joined).map_err(|_| not_found(joined.clone()))?;
        if !is_executable(&path) {
            return Err(not_found(path));
        }
        Ok(path)
    }

    fn command(&self, script: &Path, cwd: &Path, inputs: &Inputs) -> Result<Command> {
        let inputs_json = serde_json::to_string(inputs).map_err(|e| RunnerError::InvalidStep {
            step: self.step_name.clone(),
            reason: format!("inputs are not serializable: {}", e),
        })?;

        let mut command = Command::new(script);
        command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in inputs {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !is_valid_env_name(key) || rendered.contains('\0') {
                tracing::warn!(
                    step = %self.step_name,
                    key = %key,
                    "Input cannot be passed as an environment variable, available via {}",
                    INPUTS_ENV
                );
                continue;
            }
            command.env(key, rendered);
        }

        // Set last so inputs cannot shadow them.
        command
            .env(INPUTS_ENV, inputs_json)
            .env(STAGE_ENV, self.stage.as_str())
            .env(STEP_ENV, &self.step_name);

        // Own process group, so cancellation reaches anything the script forks.
        #[cfg(unix)]
        command.process_group(0);

        Ok(command)
    }

    /// Stop a running script: SIGTERM to its process group, then SIGKILL
    /// once the grace period runs out. The child is always reaped.
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) {
        if let Some(pid) = pid {
            signal_group(pid, Signal::Terminate);
        } else {
            let _ = child.start_kill();
        }

        match tokio::time::timeout(self.kill_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(step = %self.step_name, ?status, "Script exited after SIGTERM");
            }
            Ok(Err(e)) => {
                tracing::warn!(step = %self.step_name, error = %e, "Failed to wait for script");
            }
            Err(_) => {
                tracing::warn!(
                    step = %self.step_name,
                    grace = ?self.kill_grace,
                    "Script ignored SIGTERM, killing"
                );
            }
        }

        // Sweep the group even if the leader exited; forked children may
        // still hold the output pipes.
        if let Some(pid) = pid {
            signal_group(pid, Signal::Kill);
        }
        if let Ok(None) = child.try_wait() {
            let _ = child.kill().await;
        }
    }

    /// Wait for the output relays to reach EOF, bounded by
    /// [`RELAY_DRAIN_TIMEOUT`] and the context's cancellation.
    async fn drain_relays(&self, relays: &mut [JoinHandle<u64>], ctx: &RunnerContext) -> Drain {
        let join_all = async {
            for handle in relays.iter_mut() {
                if let Err(e) = handle.await {
                    tracing::warn!(step = %self.step_name, error = %e, "Output relay task failed");
                }
            }
        };

        tokio::select! {
            result = tokio::time::timeout(RELAY_DRAIN_TIMEOUT, join_all) => match result {
                Ok(()) => Drain::Complete,
                Err(_) => Drain::TimedOut,
            },
            _ = ctx.cancellation().cancelled() => Drain::Cancelled,
        }
    }
}

/// How draining the output relays ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Complete,
    TimedOut,
    Cancelled,
}

#[async_trait]
impl Runner for ScriptStep {
    async fn run(&self, ctx: &RunnerContext) -> Result<()> {
        let inputs = self
            .inputs
            .resolve(ctx, self.stage)
            .map_err(|source| RunnerError::InputResolution {
                step: self.step_name.clone(),
                stage: self.stage,
                source,
            })?;

        let script = self.resolve_script(ctx)?;

        if ctx.is_cancelled() {
            return Err(RunnerError::Cancelled {
                step: self.step_name.clone(),
            });
        }

        let cwd = if self.relocatable {
            ctx.working_dir().to_path_buf()
        } else {
            script
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| ctx.working_dir().to_path_buf())
        };

        let mut command = self.command(&script, &cwd, &inputs)?;
        let mut child = ctx
            .launcher()
            .launch(&mut command)
            .map_err(|source| RunnerError::Launch {
                step: self.step_name.clone(),
                source,
            })?;

        let pid = child.id();
        let started = Instant::now();
        tracing::info!(
            step = %self.step_name,
            stage = %self.stage,
            script = %script.display(),
            pid = ?pid,
            inputs = inputs.len(),
            "Started script"
        );

        let mut relays = spawn_relays(&mut child, ctx);

        let status = tokio::select! {
            status = child.wait() => status,
            _ = ctx.cancellation().cancelled() => {
                tracing::info!(step = %self.step_name, pid = ?pid, "Cancelling script");
                self.terminate(&mut child, pid).await;
                for handle in relays {
                    handle.abort();
                    let _ = handle.await;
                }
                return Err(RunnerError::Cancelled {
                    step: self.step_name.clone(),
                });
            }
        };

        let status = status.map_err(|source| RunnerError::Launch {
            step: self.step_name.clone(),
            source,
        })?;

        let drain = self.drain_relays(&mut relays, ctx).await;

        // The step's process group does not outlive the step.
        if let Some(pid) = pid {
            signal_group(pid, Signal::Kill);
        }
        for handle in &relays {
            handle.abort();
        }

        match drain {
            Drain::Complete => {}
            Drain::TimedOut => {
                tracing::warn!(
                    step = %self.step_name,
                    pid = ?pid,
                    "Script exited but its output pipes stayed open, killed leftover processes"
                );
            }
            Drain::Cancelled => {
                tracing::info!(step = %self.step_name, pid = ?pid, "Cancelled while draining output");
                return Err(RunnerError::Cancelled {
                    step: self.step_name.clone(),
                });
            }
        }

        let exit_code = exit_code(status);
        tracing::info!(
            step = %self.step_name,
            exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Script finished"
        );

        if exit_code == 0 {
            Ok(())
        } else {
            Err(RunnerError::ScriptExecution {
                step: self.step_name.clone(),
                exit_code,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn spawn_relays(child: &mut Child, ctx: &RunnerContext) -> Vec<JoinHandle<u64>> {
    let mut handles = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        handles.push(tokio::spawn(relay(
            stdout,
            OutputStream::Stdout,
            ctx.output().clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        handles.push(tokio::spawn(relay(
            stderr,
            OutputStream::Stderr,
            ctx.output().clone(),
        )));
    }
    handles
}

/// Exit code of a finished script. Signal deaths map to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn is_valid_env_name(key: &str) -> bool {
    !key.is_empty() && !key.contains('=') && !key.contains('\0')
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && has_exec_bit(&meta),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn has_exec_bit(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &std::fs::Metadata) -> bool {
    true
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) {
    let signo = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) takes plain integers. The script was spawned with
    // process_group(0), so its pid is also its process group id.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signo) };
    if rc != 0 {
        tracing::debug!(
            pid,
            ?signal,
            error = %std::io::Error::last_os_error(),
            "Process group signal not delivered"
        );
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: Signal) {}
