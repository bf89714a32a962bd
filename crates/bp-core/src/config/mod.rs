//! Configuration management for bundlepush

mod push;
pub mod serde_utils;

pub use push::PushConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the SSH password
pub const PASSWORD_ENV: &str = "BUNDLEPUSH_SSH_PASS";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bundlepush")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the push configuration.
///
/// An explicitly given path must exist and parse. Without one, the default
/// location is tried and anything wrong with it falls back to defaults.
pub fn load_push_config(explicit: Option<&Path>) -> Result<PushConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let default_path = default_config_path();
    if !default_path.exists() {
        return Ok(PushConfig::default());
    }

    Ok(load_config(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        PushConfig::default()
    }))
}
