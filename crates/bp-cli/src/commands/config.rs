//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::output::{print_info, print_warning};
use bp_core::config::{self, PASSWORD_ENV};

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Print the configuration file location
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve(config_path).display());
    Ok(())
}

/// Print the effective configuration with the password masked
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!(
            "No configuration file found at {:?}, showing defaults",
            path
        ));
    }

    let loaded = config::load_push_config(config_path)?;
    println!();
    println!("{}", toml::to_string_pretty(&loaded.redacted())?);

    if std::env::var_os(PASSWORD_ENV).is_some() {
        print_info(&format!("{} is set and overrides the password", PASSWORD_ENV));
    }

    Ok(())
}
