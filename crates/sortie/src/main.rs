//! Sortie - run release errands against a deployment
//!
//! Main entry point for the Sortie CLI.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sortie_runner::RunnerError;

mod commands;

use commands::{config, errand};

/// Exit code for runs interrupted by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sortie - run release errands against a deployment
#[derive(Parser)]
#[command(name = "sortie")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Client profile to use instead of the active one
    #[arg(long, global = true, env = "SORTIE_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Client configuration and profiles
    Config(config::ConfigArgs),

    /// List and run release errands
    Errand(errand::ErrandArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "sortie=debug,sortie_runner=debug,sortie_config=debug,sortie_registry=debug,info"
    } else {
        "sortie=info,sortie_runner=info,sortie_registry=info,warn"
    };

    let log_dir = sortie_config::log_dir();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sortie.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "sortie=trace,sortie_runner=trace,sortie_config=trace,sortie_registry=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        profile: cli.profile,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Errand(args) => errand::run(args, &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Map a command failure to a process exit status.
///
/// Cancelled runs exit with 130; a failed script passes its own exit code
/// through. Everything else is 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RunnerError>() {
        Some(e) if e.is_cancelled() => EXIT_CANCELLED,
        Some(e) => e
            .exit_code()
            .and_then(|code| u8::try_from(code).ok())
            .filter(|code| *code != 0)
            .unwrap_or(1),
        None => 1,
    }
}
