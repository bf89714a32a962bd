//! CLI command implementations

mod config;
mod install;

pub use config::{config_path, config_show};
pub use install::{install_command, InstallArgs};
