//! Line scanning and tagged output of remote streams

use std::borrow::Cow;
use std::sync::Arc;

use futures::StreamExt;
use indicatif::MultiProgress;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};

use bp_core::types::dispatch_tag;
use bp_core::OutputStream;

/// Longest line a scanner accepts before reporting an error
pub(crate) const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Bytes buffered between the channel reader and a scanner.
///
/// Writes block once this fills, so output is never dropped.
const PIPE_CAPACITY: usize = 8 * 1024;

/// Destination for everything a remote command prints
pub trait OutputSink: Send + Sync {
    /// A command is about to be dispatched
    fn command(&self, command: &str);

    /// One complete line from a remote stream
    fn line(&self, stream: OutputStream, line: &str);

    /// The scanner for `stream` gave up
    fn scan_error(&self, stream: OutputStream, error: &str);

    /// A progress message from the run itself
    fn notice(&self, message: &str);
}

/// Logs through `tracing`, hiding progress bars while each line is written
#[derive(Clone)]
pub struct ConsoleSink {
    progress: MultiProgress,
}

impl ConsoleSink {
    pub fn new(progress: MultiProgress) -> Self {
        Self { progress }
    }
}

impl OutputSink for ConsoleSink {
    fn command(&self, command: &str) {
        self.progress
            .suspend(|| tracing::info!("[{}] {}", dispatch_tag(), command));
    }

    fn line(&self, stream: OutputStream, line: &str) {
        self.progress
            .suspend(|| tracing::info!("[{}] {}", stream.tag(), line));
    }

    fn scan_error(&self, stream: OutputStream, error: &str) {
        self.progress
            .suspend(|| tracing::warn!("[{}] {}", stream.tag(), error));
    }

    fn notice(&self, message: &str) {
        self.progress.suspend(|| tracing::info!("{}", message));
    }
}

/// Spawn a task turning bytes written to the returned pipe into lines.
///
/// Lines are split on raw `\n` bytes and decoded lossily, so invalid UTF-8
/// never interrupts the stream. Dropping the pipe ends the task after any
/// unterminated final line has been emitted. Only a line longer than
/// [`MAX_LINE_LENGTH`] stops the scanner, after being reported once.
pub(crate) fn spawn_line_scanner(
    stream: OutputStream,
    sink: Arc<dyn OutputSink>,
) -> (DuplexStream, JoinHandle<()>) {
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    let task = tokio::spawn(async move {
        let codec =
            AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), MAX_LINE_LENGTH);
        let mut lines = FramedRead::new(reader, codec);

        while let Some(result) = lines.next().await {
            match result {
                Ok(line) => sink.line(stream, &decode_line(&line)),
                Err(e) => {
                    sink.scan_error(stream, &e.to_string());
                    break;
                }
            }
        }
    });

    (writer, task)
}

/// Text of one scanned line, without a trailing carriage return
fn decode_line(line: &[u8]) -> Cow<'_, str> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}
