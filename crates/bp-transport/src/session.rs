//! Outbound SSH session with a reverse tunnel

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, Disconnect};
use russh_keys::key::PublicKey;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use bp_core::config::PushConfig;
use bp_core::traits::{CommandChannel, Connector, Transport, TunnelListener, TunnelStream};
use bp_core::{Credentials, Target, TransportError, TunnelEndpoint};

use crate::channel::SshCommandChannel;

/// Remote address the tunnel listens on
pub const TUNNEL_BIND_HOST: &str = "127.0.0.1";

/// Forwarded connections waiting for the file server to accept them.
///
/// The handler never blocks the session loop on this queue; connections
/// beyond the capacity are refused.
const FORWARD_QUEUE_CAPACITY: usize = 32;

fn ssh_error(err: russh::Error) -> TransportError {
    TransportError::Ssh(err.into())
}

/// Dials devices over SSH with password authentication
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
}

impl SshConnector {
    /// Create a connector with the given dial + auth deadline
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Create a connector from the push configuration
    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.connect_timeout)
    }

    async fn dial(
        &self,
        target: &Target,
        credentials: &Credentials,
        handler: ClientHandler,
    ) -> Result<Handle<ClientHandler>, TransportError> {
        let ssh_config = Arc::new(Config::default());

        tracing::debug!("Connecting to {}", target);
        let mut handle = client::connect(ssh_config, (target.host.as_str(), target.port), handler)
            .await
            .map_err(TransportError::Ssh)?;

        tracing::debug!("Authenticating as user '{}'", credentials.user);
        let authenticated = handle
            .authenticate_password(&credentials.user, &credentials.password)
            .await
            .map_err(ssh_error)?;

        if !authenticated {
            return Err(TransportError::AuthenticationRejected(
                credentials.user.clone(),
            ));
        }

        Ok(handle)
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshTransport;

    async fn connect(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SshTransport, TransportError> {
        let (forward_tx, forward_rx) = mpsc::channel(FORWARD_QUEUE_CAPACITY);
        let handler = ClientHandler { forward_tx };

        let handle = tokio::time::timeout(
            self.connect_timeout,
            self.dial(target, credentials, handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.connect_timeout))??;

        Ok(SshTransport {
            handle,
            incoming: Some(forward_rx),
            closed: false,
        })
    }
}

/// A live SSH session to the device.
///
/// Dropping the transport drops the session handle, which ends the session
/// task and closes the socket even if [`Transport::close`] was never reached.
pub struct SshTransport {
    handle: Handle<ClientHandler>,
    /// Forwarded connections; handed out once by `open_tunnel`
    incoming: Option<mpsc::Receiver<TunnelStream>>,
    closed: bool,
}

#[async_trait]
impl Transport for SshTransport {
    async fn open_tunnel(&mut self) -> Result<TunnelListener, TransportError> {
        let incoming = self
            .incoming
            .take()
            .ok_or(TransportError::TunnelAlreadyOpen)?;

        let port = self
            .handle
            .tcpip_forward(TUNNEL_BIND_HOST, 0)
            .await
            .map_err(|e| TransportError::ForwardRejected(e.to_string()))?;

        if port == 0 {
            return Err(TransportError::ForwardRejected(
                "server did not report the allocated port".to_string(),
            ));
        }

        tracing::debug!("Remote forward established on {}:{}", TUNNEL_BIND_HOST, port);
        Ok(TunnelListener::new(
            TunnelEndpoint::new(TUNNEL_BIND_HOST, port),
            incoming,
        ))
    }

    async fn exec(&self, command: &str) -> Result<Box<dyn CommandChannel>, TransportError> {
        if self.closed || self.handle.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(ssh_error)?;

        channel.exec(true, command).await.map_err(ssh_error)?;

        Ok(Box::new(SshCommandChannel::new(channel)))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.handle.is_closed() {
            tracing::debug!("Session already closed by remote");
            return Ok(());
        }

        self.handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(ssh_error)
    }
}

/// SSH client handler for the device session
struct ClientHandler {
    /// Sink for connections arriving at the forwarded port
    forward_tx: mpsc::Sender<TunnelStream>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Devices are reached on trusted networks and reflashed often, so any
    /// host key is accepted.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {} (not verified)", server_public_key.fingerprint());
        Ok(true)
    }

    async fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!(
            "Forwarded connection from {}:{} to {}:{}",
            originator_address,
            originator_port,
            connected_address,
            connected_port
        );

        match self.forward_tx.try_send(Box::new(channel.into_stream())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Too many pending tunnel connections, dropping one");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("File server gone, dropping forwarded connection");
            }
        }

        Ok(())
    }
}
