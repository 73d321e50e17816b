//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file settings.
pub const ENV_SECRET_PATH: &str = "SUBSTUB_SECRET_PATH";
pub const ENV_BIND_ADDRESS: &str = "SUBSTUB_BIND_ADDRESS";
pub const ENV_BASE_DIR: &str = "SUBSTUB_BASE_DIR";
pub const ENV_LOG_LEVEL: &str = "SUBSTUB_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides to, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_str(&content, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] for in-memory TOML with an explicit environment.
pub fn load_config_str<F>(content: &str, env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = env(ENV_SECRET_PATH) {
        config.http.secret_path = secret;
    }
    if let Some(addr) = env(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(dir) = env(ENV_BASE_DIR) {
        config.paths.base_dir = PathBuf::from(dir);
    }
    if let Some(level) = env(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
}
