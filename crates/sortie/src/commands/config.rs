//! Config command - client profile management.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use sortie_config::{self, Profile};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the active profile, or a single field of it (`--json` for JSON)
    Profile {
        /// Field to print (name, api-server, token, token-env, timeout)
        field: Option<String>,
    },

    /// Show the active profile name
    ActiveProfile,

    /// List configured profiles
    ListProfiles,

    /// Set the active profile (defaults to --profile)
    SetProfile {
        /// Profile name to switch to
        name: Option<String>,
    },

    /// Create or update a profile
    Set {
        /// Profile name
        name: String,

        /// Registry URL (e.g., https://registry.example.com)
        #[arg(long)]
        api_server: Option<String>,

        /// Inline registry token
        #[arg(long)]
        token: Option<String>,

        /// Environment variable holding the registry token
        #[arg(long)]
        token_env: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Delete a profile
    DeleteProfile {
        /// Profile name to delete
        name: String,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Profile { field } => cmd_profile(ctx, field.as_deref()).await,
        ConfigCommand::ActiveProfile => cmd_active_profile(ctx).await,
        ConfigCommand::ListProfiles => cmd_list_profiles(ctx).await,
        ConfigCommand::SetProfile { name } => cmd_set_profile(ctx, name).await,
        ConfigCommand::Set {
            name,
            api_server,
            token,
            token_env,
            timeout,
        } => cmd_set(&name, api_server, token, token_env, timeout).await,
        ConfigCommand::DeleteProfile { name } => cmd_delete_profile(&name).await,
        ConfigCommand::Path => cmd_path().await,
    }
}

async fn cmd_profile(ctx: &Context, field: Option<&str>) -> Result<()> {
    let config = sortie_config::load_config()?;
    let profile = config.select(ctx.profile.as_deref())?;

    if let Some(field) = field {
        println!("{}", profile.field(field)?);
        return Ok(());
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    println!("name:       {}", profile.name);
    println!("api-server: {}", profile.api_server);
    if let Some(ref var) = profile.token_env {
        println!("token-env:  {}", var);
    }
    let token_status = if profile.resolve_token().is_some() {
        "set"
    } else {
        "not set"
    };
    println!("token:      {}", token_status);
    println!("timeout:    {}s", config.timeout_for(profile).as_secs());

    Ok(())
}

async fn cmd_active_profile(ctx: &Context) -> Result<()> {
    let config = sortie_config::load_config()?;

    match ctx.profile.as_ref().or(config.current_profile.as_ref()) {
        Some(name) => {
            println!("{}", name);
        }
        None => {
            println!("No active profile set. Use 'sortie config set-profile <name>' to set one.");
        }
    }

    Ok(())
}

async fn cmd_list_profiles(ctx: &Context) -> Result<()> {
    let config = sortie_config::load_config()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config.profile_names())?);
        return Ok(());
    }

    if config.profiles.is_empty() {
        println!("No profiles configured.");
        println!();
        println!("Create one with:");
        println!("  sortie config set local --api-server=http://localhost:7770");
        return Ok(());
    }

    let current = config.current_profile.as_deref();

    println!("CURRENT   NAME            API SERVER");
    for profile in &config.profiles {
        let marker = if current == Some(profile.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{}         {:<15} {}", marker, profile.name, profile.api_server);
    }

    Ok(())
}

async fn cmd_set_profile(ctx: &Context, name: Option<String>) -> Result<()> {
    let name = name
        .or_else(|| ctx.profile.clone())
        .context("no profile name given (pass NAME or --profile)")?;

    let mut config = sortie_config::load_config()?;
    config.use_profile(&name)?;
    sortie_config::save_config(&config)?;

    println!("Switched to profile \"{}\".", name);

    Ok(())
}

async fn cmd_set(
    name: &str,
    api_server: Option<String>,
    token: Option<String>,
    token_env: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let mut config = sortie_config::load_config()?;

    let mut profile = match config.get_profile(name) {
        Some(existing) => existing.clone(),
        None => {
            let api_server = api_server.clone().ok_or_else(|| {
                anyhow::anyhow!("--api-server is required when creating a new profile")
            })?;
            Profile::new(name, api_server)
        }
    };
    let is_new = config.get_profile(name).is_none();

    if let Some(url) = api_server {
        profile.api_server = url;
    }
    if let Some(t) = token {
        profile.token = Some(t);
    }
    if let Some(var) = token_env {
        profile.token_env = Some(var);
    }
    if let Some(t) = timeout {
        profile.timeout = Some(t);
    }
    config.set_profile(profile);

    if is_new {
        println!("Profile \"{}\" created.", name);
    } else {
        println!("Profile \"{}\" modified.", name);
    }

    // The first profile becomes the active one
    if config.current_profile.is_none() && config.profiles.len() == 1 {
        config.current_profile = Some(name.to_string());
        println!("Profile \"{}\" set as active profile.", name);
    }

    sortie_config::save_config(&config)?;

    Ok(())
}

async fn cmd_delete_profile(name: &str) -> Result<()> {
    let mut config = sortie_config::load_config()?;

    match config.remove_profile(name) {
        Some(_) => {
            sortie_config::save_config(&config)?;
            println!("Profile \"{}\" deleted.", name);
            if config.current_profile.is_none() {
                println!(
                    "Note: No active profile. Use 'sortie config set-profile <name>' to set one."
                );
            }
            Ok(())
        }
        None => Err(sortie_config::ConfigError::ProfileNotFound(name.to_string()).into()),
    }
}

async fn cmd_path() -> Result<()> {
    let path = sortie_config::config_path().context("could not determine config directory")?;
    println!("{}", path.display());
    Ok(())
}
