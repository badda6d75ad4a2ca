//! Client profiles: which registry to talk to and how to authenticate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// Default config filename.
const CLIENT_CONFIG_FILE: &str = "client.yaml";

/// Profile fields that can be queried by name.
pub const PROFILE_FIELDS: &[&str] = &["name", "api-server", "token", "token-env", "timeout"];

/// Root client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Name of the active profile.
    #[serde(default)]
    pub current_profile: Option<String>,

    /// Named profiles.
    #[serde(default)]
    pub profiles: Vec<Profile>,

    /// Settings applied when a profile does not override them.
    #[serde(default)]
    pub defaults: ClientDefaults,
}

impl ClientConfig {
    /// Create an empty client config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Get the active profile, if set and valid.
    pub fn current(&self) -> Option<&Profile> {
        self.current_profile
            .as_ref()
            .and_then(|name| self.get_profile(name))
    }

    /// Get a profile by name.
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Resolve a profile by explicit name, falling back to the active one.
    pub fn select(&self, name: Option<&str>) -> Result<&Profile> {
        match name {
            Some(name) => self
                .get_profile(name)
                .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string())),
            None => match &self.current_profile {
                Some(current) => self
                    .get_profile(current)
                    .ok_or_else(|| ConfigError::ProfileNotFound(current.clone())),
                None => Err(ConfigError::NoActiveProfile),
            },
        }
    }

    /// Add or replace a profile.
    pub fn set_profile(&mut self, profile: Profile) {
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == profile.name) {
            *existing = profile;
        } else {
            self.profiles.push(profile);
        }
    }

    /// Remove a profile by name. Clears the active profile if it was removed.
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        let pos = self.profiles.iter().position(|p| p.name == name)?;
        if self.current_profile.as_deref() == Some(name) {
            self.current_profile = None;
        }
        Some(self.profiles.remove(pos))
    }

    /// Make `name` the active profile.
    pub fn use_profile(&mut self, name: &str) -> Result<()> {
        if self.get_profile(name).is_some() {
            self.current_profile = Some(name.to_string());
            Ok(())
        } else {
            Err(ConfigError::ProfileNotFound(name.to_string()))
        }
    }

    /// List all profile names.
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Request timeout for a profile, applying defaults.
    pub fn timeout_for(&self, profile: &Profile) -> Duration {
        Duration::from_secs(profile.timeout.unwrap_or(self.defaults.timeout))
    }

    /// Grace period between SIGTERM and SIGKILL for cancelled scripts.
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.defaults.kill_grace_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// A named registry profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Profile {
    pub name: String,

    /// Registry base URL.
    pub api_server: String,

    /// Inline registry token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the registry token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Request timeout override (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(name: impl Into<String>, api_server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_server: api_server.into(),
            token: None,
            token_env: None,
            timeout: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_token_env(mut self, var: impl Into<String>) -> Self {
        self.token_env = Some(var.into());
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve the registry token: inline value first, then the env var.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }
        self.token_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty())
    }

    /// Look up a field by its config name. Unset optional fields yield an
    /// empty string.
    pub fn field(&self, field: &str) -> Result<String> {
        let value = match field {
            "name" => self.name.clone(),
            "api-server" | "api_server" => self.api_server.clone(),
            "token" => self.token.clone().unwrap_or_default(),
            "token-env" | "token_env" => self.token_env.clone().unwrap_or_default(),
            "timeout" => self.timeout.map(|t| t.to_string()).unwrap_or_default(),
            _ => {
                return Err(ConfigError::ProfileFieldNotFound {
                    profile: self.name.clone(),
                    field: field.to_string(),
                    known: PROFILE_FIELDS.join(", "),
                });
            }
        };
        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Settings applied to all profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientDefaults {
    /// Default request timeout in seconds.
    pub timeout: u64,

    /// Seconds a cancelled script gets between SIGTERM and SIGKILL.
    pub kill_grace_secs: u64,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            timeout: 30,
            kill_grace_secs: 5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Get the path to the client config file.
pub fn config_path() -> Option<PathBuf> {
    crate::config_dir().map(|d| d.join(CLIENT_CONFIG_FILE))
}

/// Load the client configuration.
///
/// Returns a default config if the file doesn't exist.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(config_path().as_deref())
}

/// Load client config from a specific path.
pub fn load_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::new());
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No client config, using defaults");
        return Ok(ClientConfig::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientConfig::from_yaml(&contents)
}

/// Save the client configuration.
pub fn save_config(config: &ClientConfig) -> Result<()> {
    let path = config_path()
        .ok_or_else(|| ConfigError::Other("could not determine config directory".to_string()))?;
    save_config_to(config, &path)
}

/// Save client config to a specific path.
pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_yaml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "Saved client config");

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
