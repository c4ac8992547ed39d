//! Configuration loading and config file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/bibrec/config.toml`), if the file exists
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the bootstrap config file
pub const CONFIG_ENV_VAR: &str = "BIBREC_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error, `bibrec_core=debug`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read, if any.
///
/// Returns `Ok(None)` when no file is configured and the platform default does not exist;
/// callers then fall back to built-in defaults. An explicitly named file (CLI or environment)
/// that does not exist is an error, so a typo never silently reverts to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_file() {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // Priority 4: built-in defaults
    Ok(None)
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// Platform default config file location
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibrec").join("config.toml"))
}

/// Load a TOML document into `T`, or `T::default()` when `path` is `None`.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path)?;

    toml::from_str(&content).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
}
