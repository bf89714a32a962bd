//! Runs one remote command to completion

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, DuplexStream};

use bp_core::traits::{ChannelOutput, CommandChannel, Transport};
use bp_core::{CommandError, OutputStream};

use super::output::{spawn_line_scanner, OutputSink};

/// Executes commands on fresh channels of a transport
pub struct CommandRunner {
    sink: Arc<dyn OutputSink>,
    timeout: Option<Duration>,
}

impl CommandRunner {
    /// Create a runner without a deadline
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            timeout: None,
        }
    }

    /// Bound every command by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command` and wait until it exits and all output was emitted.
    ///
    /// The channel is closed before returning, whatever the outcome.
    pub async fn run<T>(&self, transport: &T, command: &str) -> Result<(), CommandError>
    where
        T: Transport + ?Sized,
    {
        self.sink.command(command);

        let mut channel = transport.exec(command).await.map_err(CommandError::Open)?;

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drain(channel.as_mut()))
                .await
                .unwrap_or(Err(CommandError::TimedOut(limit))),
            None => self.drain(channel.as_mut()).await,
        };

        channel.close().await;
        result
    }

    async fn drain(&self, channel: &mut dyn CommandChannel) -> Result<(), CommandError> {
        let (mut stdout, stdout_task) =
            spawn_line_scanner(OutputStream::Stdout, Arc::clone(&self.sink));
        let (mut stderr, stderr_task) =
            spawn_line_scanner(OutputStream::Stderr, Arc::clone(&self.sink));

        let mut outcome = None;
        while let Some(output) = channel.next().await {
            match output {
                ChannelOutput::Stdout(data) => forward(&mut stdout, OutputStream::Stdout, &data).await,
                ChannelOutput::Stderr(data) => forward(&mut stderr, OutputStream::Stderr, &data).await,
                ChannelOutput::ExitStatus(0) => outcome = Some(Ok(())),
                ChannelOutput::ExitStatus(code) => outcome = Some(Err(CommandError::ExitStatus(code))),
                ChannelOutput::ExitSignal(signal) => outcome = Some(Err(CommandError::Signal(signal))),
                ChannelOutput::Rejected => outcome = Some(Err(CommandError::Rejected)),
            }
        }

        // EOF for both scanners, then wait for them to flush
        drop(stdout);
        drop(stderr);
        let (stdout_done, stderr_done) = tokio::join!(stdout_task, stderr_task);
        for done in [stdout_done, stderr_done] {
            if let Err(e) = done {
                tracing::warn!("Output scanner task failed: {}", e);
            }
        }

        outcome.unwrap_or(Err(CommandError::ExitMissing))
    }
}

async fn forward(pipe: &mut DuplexStream, stream: OutputStream, data: &[u8]) {
    if let Err(e) = pipe.write_all(data).await {
        tracing::trace!("Dropping {} output, scanner stopped: {}", stream.label(), e);
    }
}
