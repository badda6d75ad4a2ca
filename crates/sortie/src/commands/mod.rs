//! CLI command handlers.

pub mod config;
pub mod errand;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Profile selected with `--profile`, if any.
    pub profile: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
