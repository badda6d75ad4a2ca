//! Client configuration for Sortie.
//!
//! Named profiles (registry server + credentials) in a single YAML file, with
//! an active profile used when none is given on the command line:
//!
//! ```yaml
//! current-profile: prod
//! profiles:
//!   - name: prod
//!     api-server: https://registry.example.com
//!     token-env: SORTIE_TOKEN
//! defaults:
//!   timeout: 30
//!   kill-grace-secs: 5
//! ```

pub mod error;
pub mod paths;
pub mod profile;

pub use error::{ConfigError, Result};
pub use paths::{CONFIG_DIR_ENV, config_dir, log_dir};
pub use profile::{
    ClientConfig, ClientDefaults, PROFILE_FIELDS, Profile, config_path, load_config,
    load_config_from, save_config, save_config_to,
};
