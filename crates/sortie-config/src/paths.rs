//! Platform directories used by the client.

use std::path::PathBuf;

/// Application name for platform directory resolution.
const APP_NAME: &str = "sortie";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "SORTIE_CONFIG_DIR";

/// Get the config directory for sortie.
///
/// Checks `SORTIE_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for rolling log files.
pub fn log_dir() -> PathBuf {
    config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
