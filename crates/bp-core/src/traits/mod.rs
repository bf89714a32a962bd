//! Core trait definitions

mod transport;

pub use transport::{
    ChannelOutput, CommandChannel, Connector, Transport, TunnelIo, TunnelListener, TunnelStream,
};
