//! Error types for bundlepush
//!
//! Errors are grouped by the phase that produced them so the final message
//! always names what failed: checking bundles, talking to the transport,
//! running a remote command, or loading configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the secure transport and anything derived from it
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection attempt did not finish in time
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the supplied credentials
    #[error("authentication rejected for user '{0}'")]
    AuthenticationRejected(String),

    /// The server refused to open a remote port forward
    #[error("remote port forwarding refused: {0}")]
    ForwardRejected(String),

    /// A tunnel was already requested on this session
    #[error("a tunnel is already open on this session")]
    TunnelAlreadyOpen,

    /// The session is no longer usable
    #[error("transport session closed")]
    Closed,

    /// Error reported by the SSH implementation
    #[error("ssh: {0}")]
    Ssh(#[source] anyhow::Error),
}

/// Outcome of a remote command that did not finish cleanly
#[derive(Error, Debug)]
pub enum CommandError {
    /// No command channel could be opened
    #[error("unable to open command channel: {0}")]
    Open(#[source] TransportError),

    /// The remote side refused to start the command
    #[error("remote side refused to run the command")]
    Rejected,

    /// The remote command reported a non-zero exit status
    #[error("remote command exited with status {0}")]
    ExitStatus(u32),

    /// The remote command was terminated by a signal
    #[error("remote command killed by signal {0}")]
    Signal(String),

    /// The channel closed before the remote side reported an exit status
    #[error("remote command exited without reporting a status")]
    ExitMissing,

    /// The command exceeded the configured deadline
    #[error("remote command timed out after {0:?}")]
    TimedOut(Duration),
}

impl CommandError {
    /// Whether this error means the connection went away mid-command
    pub fn is_exit_missing(&self) -> bool {
        matches!(self, CommandError::ExitMissing)
    }
}

/// Top-level error for a single upload run
#[derive(Error, Debug)]
pub enum UploadError {
    /// A bundle could not be stat'ed before dialing out
    #[error("error checking bundle {path}: {source}")]
    BundleUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bundle path exists but is not a regular file
    #[error("error checking bundle {0}: not a regular file")]
    NotAFile(PathBuf),

    /// A bundle path cannot be served from the serving root
    #[error("error checking bundle {path}: not below serving root {root}")]
    OutsideServeRoot { path: PathBuf, root: PathBuf },

    /// The transport could not be established
    #[error("unable to dial ssh host {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: TransportError,
    },

    /// The reverse tunnel could not be created
    #[error("unable to forward embedded file server: {0}")]
    Tunnel(#[source] TransportError),

    /// Installing a bundle failed; later bundles were skipped
    #[error("install of bundle #{index} ({bundle}) failed: {source}")]
    Install {
        index: usize,
        bundle: PathBuf,
        #[source]
        source: CommandError,
    },

    /// The reboot command failed for a reason other than the device going down
    #[error("unable to reboot device: {0}")]
    Reboot(#[source] CommandError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid config: {0}")]
    Invalid(String),
}
