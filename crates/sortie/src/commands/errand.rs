//! Errand command - list and run the errands a release declares.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use sortie_registry::RegistryClient;
use sortie_runner::{
    DEPLOYMENT_STATE_FILE, DeploymentState, ExtraVars, RELEASE_METADATA_FILE, ReleaseMetadata,
    Runner, RunnerContext, errand_runner_with_grace,
};

use super::Context;

/// Arguments for the errand command.
#[derive(Args, Debug)]
pub struct ErrandArgs {
    #[command(subcommand)]
    pub command: ErrandCommand,
}

#[derive(Subcommand, Debug)]
pub enum ErrandCommand {
    /// List the errands declared by a release
    List {
        /// Release metadata file (default: ./release.json)
        #[arg(long)]
        release: Option<PathBuf>,
    },

    /// Run an errand against the deployment state
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Errand name
    pub name: String,

    /// Release metadata file (default: <working dir>/release.json)
    #[arg(long)]
    pub release: Option<PathBuf>,

    /// Deployment state file (default: <working dir>/deployment.json)
    #[arg(long, conflicts_with = "state_url")]
    pub state: Option<PathBuf>,

    /// Fetch the deployment state from the registry instead
    #[arg(long)]
    pub state_url: Option<String>,

    /// Extra variable, overriding calculated inputs (repeatable)
    #[arg(short = 'e', long = "extra-var", value_name = "KEY=VALUE", value_parser = parse_extra_var)]
    pub extra_vars: Vec<(String, String)>,

    /// Directory the errand runs in (default: current directory)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
}

/// Run the errand command.
pub async fn run(args: ErrandArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ErrandCommand::List { release } => cmd_list(ctx, release).await,
        ErrandCommand::Run(run_args) => cmd_run(ctx, run_args).await,
    }
}

async fn cmd_list(ctx: &Context, release: Option<PathBuf>) -> Result<()> {
    let path = release.unwrap_or_else(|| PathBuf::from(RELEASE_METADATA_FILE));
    let metadata = ReleaseMetadata::load(&path)?;

    if ctx.json_output {
        let errands: Vec<_> = metadata.errands().collect();
        println!("{}", serde_json::to_string_pretty(&errands)?);
        return Ok(());
    }

    if metadata.errands().next().is_none() {
        println!(
            "Release {} v{} declares no errands.",
            metadata.name, metadata.version
        );
        return Ok(());
    }

    println!("Errands in {} v{}:", metadata.name, metadata.version);
    for errand in metadata.errands() {
        if errand.description.is_empty() {
            println!("  {}", errand.name);
        } else {
            println!("  {:<16} {}", errand.name, errand.description);
        }
    }

    Ok(())
}

async fn cmd_run(ctx: &Context, args: RunArgs) -> Result<()> {
    let working_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };

    let release_path = args
        .release
        .unwrap_or_else(|| working_dir.join(RELEASE_METADATA_FILE));
    let metadata = ReleaseMetadata::load(&release_path)?;
    let errand = metadata.errand(&args.name)?.clone();

    let state = match (&args.state, &args.state_url) {
        (_, Some(url)) => fetch_state(ctx, url).await?,
        (Some(path), None) => DeploymentState::load(path)?,
        (None, None) => DeploymentState::load(&working_dir.join(DEPLOYMENT_STATE_FILE))?,
    };

    let extra_vars: ExtraVars = args.extra_vars.into_iter().collect();
    let kill_grace = sortie_config::load_config()?.kill_grace();

    let cancellation = CancellationToken::new();
    let signal_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling errand");
            signal_token.cancel();
        }
    });

    let runner_ctx = RunnerContext::new(Arc::new(state), &working_dir).with_cancellation(cancellation);

    tracing::info!(
        errand = %errand.name,
        release = %metadata.name,
        version = %metadata.version,
        working_dir = %working_dir.display(),
        "Starting errand"
    );

    let name = errand.name.clone();
    errand_runner_with_grace(errand, extra_vars, kill_grace)
        .run(&runner_ctx)
        .await?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({ "errand": name, "status": "succeeded" })
        );
    } else if ctx.verbose {
        println!("Errand \"{}\" succeeded.", name);
    }

    Ok(())
}

/// Fetch deployment state from the registry using the selected profile.
async fn fetch_state(ctx: &Context, url: &str) -> Result<DeploymentState> {
    let config = sortie_config::load_config()?;

    let mut builder = RegistryClient::builder();
    match config.select(ctx.profile.as_deref()) {
        Ok(profile) => {
            builder = builder
                .base_url(&profile.api_server)
                .timeout(config.timeout_for(profile));
            if let Some(token) = profile.resolve_token() {
                builder = builder.token(token);
            }
        }
        // Without a profile the state URL has to be absolute
        Err(_) if ctx.profile.is_none() => {
            builder = builder.base_url(url);
        }
        Err(e) => return Err(e.into()),
    }

    let client = builder.build()?;
    let state: DeploymentState = client
        .get_json_with_authentication(url)
        .await
        .with_context(|| format!("failed to fetch deployment state from {}", url))?;
    tracing::debug!(url, stages = state.stages().count(), "Fetched deployment state");

    Ok(state)
}

fn parse_extra_var(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
