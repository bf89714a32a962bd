//! bp-transport: SSH session to the device
//!
//! Dials the device with password authentication, runs remote commands on
//! fresh session channels, and asks the device's SSH server to forward an
//! ephemeral loopback port back to this process.

mod channel;
mod session;

pub use channel::SshCommandChannel;
pub use session::{SshConnector, SshTransport, TUNNEL_BIND_HOST};
