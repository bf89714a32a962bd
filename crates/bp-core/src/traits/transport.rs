//! Transport traits
//!
//! The uploader only talks to the device through these traits, so the same
//! orchestration runs over a real SSH session or an in-memory double.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::{Credentials, Target, TunnelEndpoint};

/// Byte stream carried by the reverse tunnel
pub trait TunnelIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> TunnelIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// One connection that arrived at the remote tunnel port
pub type TunnelStream = Box<dyn TunnelIo>;

/// Listener whose connections originate on the remote side of a transport
pub struct TunnelListener {
    endpoint: TunnelEndpoint,
    incoming: mpsc::Receiver<TunnelStream>,
}

impl TunnelListener {
    /// Create a listener fed by `incoming`
    pub fn new(endpoint: TunnelEndpoint, incoming: mpsc::Receiver<TunnelStream>) -> Self {
        Self { endpoint, incoming }
    }

    /// Remote address the listener is bound to
    pub fn endpoint(&self) -> &TunnelEndpoint {
        &self.endpoint
    }

    /// Wait for the next tunneled connection.
    ///
    /// Returns `None` once the owning transport has been torn down.
    pub async fn accept(&mut self) -> Option<TunnelStream> {
        self.incoming.recv().await
    }
}

/// Event read from a running remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutput {
    /// Bytes written to the remote stdout
    Stdout(Bytes),
    /// Bytes written to the remote stderr
    Stderr(Bytes),
    /// Exit status reported by the remote side
    ExitStatus(u32),
    /// The remote process was killed by a signal
    ExitSignal(String),
    /// The remote side refused to start the command
    Rejected,
}

/// A single-use channel running one remote command
#[async_trait]
pub trait CommandChannel: Send {
    /// Next output event, `None` once the channel is closed
    async fn next(&mut self) -> Option<ChannelOutput>;

    /// Close the channel; safe to call after the remote side closed it
    async fn close(&mut self);
}

/// A live secure session to the device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create the reverse listener on an ephemeral loopback port of the device
    async fn open_tunnel(&mut self) -> Result<TunnelListener, TransportError>;

    /// Open a fresh channel and start `command` on it
    async fn exec(&self, command: &str) -> Result<Box<dyn CommandChannel>, TransportError>;

    /// Tear down the session and everything derived from it
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Establishes transport sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// The session type produced by this connector
    type Session: Transport;

    /// Dial `target` and authenticate with `credentials`
    async fn connect(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<Self::Session, TransportError>;
}
