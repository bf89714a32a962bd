//! bp-core: Core abstractions and configuration for bundlepush
//!
//! This crate provides the shared types, error taxonomy, transport traits
//! and configuration structures used by the transport, the uploader and
//! the CLI.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{CommandError, ConfigError, TransportError, UploadError};
pub use types::{Credentials, OutputStream, Target, TunnelEndpoint, UploadJob};
