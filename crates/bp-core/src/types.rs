//! Core domain types

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crossterm::style::{StyledContent, Stylize};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ConfigError;

/// Port assumed when a target does not name one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Address of the remote device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Hostname or IP literal (IPv6 without brackets)
    pub host: String,
    /// SSH port
    pub port: u16,
}

impl Target {
    /// Create a target from a host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]:port` or a bare IP literal.
    ///
    /// A missing port falls back to [`DEFAULT_SSH_PORT`].
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConfigError::Invalid("empty target address".to_string()));
        }

        if let Ok(addr) = input.parse::<SocketAddr>() {
            return Ok(Self::new(addr.ip().to_string(), addr.port()));
        }

        if let Ok(ip) = input.parse::<IpAddr>() {
            return Ok(Self::new(ip.to_string(), DEFAULT_SSH_PORT));
        }

        if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Ok(Self::new(inner, DEFAULT_SSH_PORT));
        }

        if let Some((host, port)) = input.rsplit_once(':') {
            if !host.is_empty() && !host.contains(':') {
                let port = port.parse::<u16>().map_err(|_| {
                    ConfigError::Invalid(format!("invalid port in target '{}'", input))
                })?;
                return Ok(Self::new(host, port));
            }
        }

        Ok(Self::new(input, DEFAULT_SSH_PORT))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Login credentials for the transport session
#[derive(Clone)]
pub struct Credentials {
    /// Remote user name
    pub user: String,
    /// Password for password authentication
    pub password: String,
}

impl Credentials {
    /// Create password credentials
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed for one invocation
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Device to push to
    pub target: Target,
    /// Transport login
    pub credentials: Credentials,
    /// Bundles in install order
    pub bundles: Vec<PathBuf>,
    /// Issue a reboot once every bundle installed
    pub reboot_after: bool,
}

impl UploadJob {
    /// Create a job that does not reboot the device
    pub fn new(target: Target, credentials: Credentials, bundles: Vec<PathBuf>) -> Self {
        Self {
            target,
            credentials,
            bundles,
            reboot_after: false,
        }
    }

    /// Set whether the device is rebooted after a successful run
    pub fn with_reboot(mut self, reboot_after: bool) -> Self {
        self.reboot_after = reboot_after;
        self
    }
}

/// Bytes escaped inside one URL path segment: everything but RFC 3986 unreserved
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Remote-side address the reverse tunnel listens on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TunnelEndpoint(String);

impl TunnelEndpoint {
    /// Build an endpoint from the remote bind host and allocated port
    pub fn new(host: &str, port: u32) -> Self {
        Self(format!("{}:{}", host, port))
    }

    /// The `host:port` string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL the device uses to fetch `url_path` through the tunnel.
    ///
    /// Each `/`-separated segment is percent-encoded.
    pub fn bundle_url(&self, url_path: &str) -> String {
        let path = url_path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("http://{}/{}", self.0, path)
    }
}

impl fmt::Display for TunnelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which remote output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Colored marker prefixed to every line of this stream
    pub fn tag(self) -> StyledContent<&'static str> {
        match self {
            OutputStream::Stdout => "-->".cyan(),
            OutputStream::Stderr => "ERR".red(),
        }
    }

    /// Plain stream name
    pub fn label(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Colored marker for commands sent to the device
pub fn dispatch_tag() -> StyledContent<&'static str> {
    "<--".green()
}
