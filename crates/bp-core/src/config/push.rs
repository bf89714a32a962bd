//! Settings for a push run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};

/// Configuration for pushing bundles to a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// SSH user on the device
    pub user: String,

    /// SSH password on the device
    pub password: String,

    /// How long dialing and authenticating may take
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Deadline for each remote command, unbounded when absent
    #[serde(
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub command_timeout: Option<Duration>,

    /// Program invoked with the tunneled bundle URL
    pub install_command: String,

    /// Command issued when a reboot is requested
    pub reboot_command: String,

    /// Directory exposed through the tunnel
    pub serve_root: PathBuf,

    /// Only serve paths that were given as bundles
    pub only_bundles: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "root".to_string(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            install_command: "rauc install".to_string(),
            reboot_command: "reboot".to_string(),
            serve_root: PathBuf::from("."),
            only_bundles: false,
        }
    }
}

impl PushConfig {
    /// Copy suitable for display, with the password masked
    pub fn redacted(&self) -> Self {
        Self {
            password: "********".to_string(),
            ..self.clone()
        }
    }
}
