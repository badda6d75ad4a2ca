//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading, saving, or querying client config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse or serialize YAML.
    #[error("failed to parse YAML config: {0}")]
    ParseYaml(String),

    /// Profile not found.
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    /// No active profile selected.
    #[error("no active profile; run 'sortie config set-profile <name>'")]
    NoActiveProfile,

    /// Unknown profile field.
    #[error("profile '{profile}' has no field '{field}' (known fields: {known})")]
    ProfileFieldNotFound {
        profile: String,
        field: String,
        known: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}
