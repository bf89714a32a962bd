//! In-memory transport double
//!
//! Install commands fetch their URL through the tunnel listener like the
//! device would, so the real file server answers them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use bp_core::config::PushConfig;
use bp_core::traits::{
    ChannelOutput, CommandChannel, Connector, Transport, TunnelListener, TunnelStream,
};
use bp_core::{Credentials, OutputStream, Target, TransportError, TunnelEndpoint};
use bp_uploader::OutputSink;

pub const FAKE_PORT: u32 = 40123;

/// How the fake device answers one command
pub enum Reply {
    /// Emit these events, then close the channel
    Outputs(Vec<ChannelOutput>),
    /// Emit these events, then never close
    Hang(Vec<ChannelOutput>),
    /// Opening the channel fails
    Fail(TransportError),
}

impl Reply {
    pub fn exit(code: u32) -> Self {
        Reply::Outputs(vec![ChannelOutput::ExitStatus(code)])
    }

    pub fn stdout(text: &'static str, code: u32) -> Self {
        Reply::Outputs(vec![
            ChannelOutput::Stdout(Bytes::from_static(text.as_bytes())),
            ChannelOutput::ExitStatus(code),
        ])
    }

    /// Channel closes without an exit status
    pub fn vanish() -> Self {
        Reply::Outputs(Vec::new())
    }
}

pub type Script = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

/// A request the fake device made through the tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub path: String,
    pub status: u16,
    pub body_len: usize,
}

#[derive(Default)]
pub struct Recorder {
    pub connects: Mutex<usize>,
    pub commands: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<Fetch>>,
    pub closes: Mutex<usize>,
}

impl Recorder {
    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<Fetch> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

pub struct FakeConnector {
    pub recorder: Arc<Recorder>,
    script: Script,
    connect_error: bool,
    tunnel_error: bool,
}

impl FakeConnector {
    pub fn new(script: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            script: Arc::new(script),
            connect_error: false,
            tunnel_error: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.connect_error = true;
        self
    }

    pub fn failing_tunnel(mut self) -> Self {
        self.tunnel_error = true;
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeTransport;

    async fn connect(
        &self,
        _target: &Target,
        _credentials: &Credentials,
    ) -> Result<FakeTransport, TransportError> {
        *self.recorder.connects.lock().unwrap() += 1;
        if self.connect_error {
            return Err(TransportError::Timeout(Duration::from_secs(30)));
        }

        Ok(FakeTransport {
            recorder: Arc::clone(&self.recorder),
            script: Arc::clone(&self.script),
            tunnel_error: self.tunnel_error,
            forward_tx: None,
        })
    }
}

pub struct FakeTransport {
    recorder: Arc<Recorder>,
    script: Script,
    tunnel_error: bool,
    forward_tx: Option<mpsc::Sender<TunnelStream>>,
}

impl FakeTransport {
    async fn fetch(&self, url: &str) {
        let Some(forward_tx) = self.forward_tx.as_ref() else {
            return;
        };
        let prefix = format!("http://{}", TunnelEndpoint::new("127.0.0.1", FAKE_PORT));
        let path = url.strip_prefix(&prefix).unwrap_or(url).to_string();

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        forward_tx.send(Box::new(server)).await.unwrap();

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n",
            path
        );
        client.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();

        let text = String::from_utf8_lossy(&response);
        let status = text
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let body_len = text
            .find("\r\n\r\n")
            .map(|end| response.len() - end - 4)
            .unwrap_or(0);

        self.recorder.fetches.lock().unwrap().push(Fetch {
            path,
            status,
            body_len,
        });
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open_tunnel(&mut self) -> Result<TunnelListener, TransportError> {
        if self.tunnel_error {
            return Err(TransportError::ForwardRejected("administratively prohibited".into()));
        }

        let (tx, rx) = mpsc::channel(8);
        self.forward_tx = Some(tx);
        Ok(TunnelListener::new(
            TunnelEndpoint::new("127.0.0.1", FAKE_PORT),
            rx,
        ))
    }

    async fn exec(&self, command: &str) -> Result<Box<dyn CommandChannel>, TransportError> {
        self.recorder
            .commands
            .lock()
            .unwrap()
            .push(command.to_string());

        let (outputs, hang) = match (self.script)(command) {
            Reply::Fail(e) => return Err(e),
            Reply::Outputs(outputs) => (outputs, false),
            Reply::Hang(outputs) => (outputs, true),
        };

        if let Some(url) = command.strip_prefix("rauc install ") {
            self.fetch(url.trim_matches('\'')).await;
        }

        Ok(Box::new(FakeChannel {
            outputs: outputs.into(),
            hang,
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        *self.recorder.closes.lock().unwrap() += 1;
        self.forward_tx = None;
        Ok(())
    }
}

struct FakeChannel {
    outputs: VecDeque<ChannelOutput>,
    hang: bool,
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn next(&mut self) -> Option<ChannelOutput> {
        match self.outputs.pop_front() {
            Some(output) => Some(output),
            None if self.hang => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) {}
}

/// Sink recording every event as a plain string
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self, stream: OutputStream) -> Vec<String> {
        self.with_prefix(&format!("{}: ", stream.label()))
    }

    pub fn notices(&self) -> Vec<String> {
        self.with_prefix("notice: ")
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

impl OutputSink for CollectingSink {
    fn command(&self, command: &str) {
        self.events.lock().unwrap().push(format!("command: {}", command));
    }

    fn line(&self, stream: OutputStream, line: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}: {}", stream.label(), line));
    }

    fn scan_error(&self, stream: OutputStream, error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} error: {}", stream.label(), error));
    }

    fn notice(&self, message: &str) {
        self.events.lock().unwrap().push(format!("notice: {}", message));
    }
}

pub fn hidden_progress() -> MultiProgress {
    MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
}

/// Temp directory holding bundles of the given sizes
pub fn bundle_dir(bundles: &[(&str, usize)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, size) in bundles {
        std::fs::write(dir.path().join(name), vec![0x5au8; *size]).unwrap();
    }
    dir
}

pub fn config_for(serve_root: &Path) -> PushConfig {
    PushConfig {
        serve_root: serve_root.to_path_buf(),
        ..PushConfig::default()
    }
}
