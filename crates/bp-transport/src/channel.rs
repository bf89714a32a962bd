//! Command channel over an SSH session

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use bp_core::traits::{ChannelOutput, CommandChannel};

/// Extended data type carrying stderr (RFC 4254 section 5.2)
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// One exec'd command on its own session channel
pub struct SshCommandChannel {
    channel: Channel<Msg>,
    closed: bool,
}

impl SshCommandChannel {
    pub(crate) fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            closed: false,
        }
    }
}

#[async_trait]
impl CommandChannel for SshCommandChannel {
    async fn next(&mut self) -> Option<ChannelOutput> {
        if self.closed {
            return None;
        }

        loop {
            let msg = match self.channel.wait().await {
                Some(msg) => msg,
                None => {
                    self.closed = true;
                    return None;
                }
            };

            match msg {
                ChannelMsg::Data { data } => {
                    return Some(ChannelOutput::Stdout(Bytes::copy_from_slice(&data)));
                }
                ChannelMsg::ExtendedData { data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    return Some(ChannelOutput::Stderr(Bytes::copy_from_slice(&data)));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ChannelOutput::ExitStatus(exit_status));
                }
                ChannelMsg::ExitSignal {
                    signal_name,
                    error_message,
                    ..
                } => {
                    tracing::debug!("Remote signal {:?}: {}", signal_name, error_message);
                    return Some(ChannelOutput::ExitSignal(format!("{:?}", signal_name)));
                }
                ChannelMsg::Failure => {
                    return Some(ChannelOutput::Rejected);
                }
                ChannelMsg::Close => {
                    self.closed = true;
                    return None;
                }
                ChannelMsg::Eof => {
                    tracing::trace!("Channel EOF");
                }
                other => {
                    tracing::trace!("Channel message: {:?}", other);
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.channel.close().await {
            tracing::debug!("Error closing command channel: {}", e);
        }
    }
}
