//! Run orchestration
//!
//! A run stats every bundle, connects to the device, opens the reverse
//! tunnel, serves the bundles through it and installs them one by one.
//! The transport is released on every path once it has been established.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::MultiProgress;

use bp_core::config::PushConfig;
use bp_core::traits::{Connector, Transport};
use bp_core::{TunnelEndpoint, UploadError, UploadJob};

use crate::bundles::BundleSizeTable;
use crate::command::{CommandRunner, ConsoleSink, OutputSink};
use crate::reboot::RebootState;
use crate::server::{FileServer, ProgressTracker};

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Bundles that were installed, in order
    pub installed: Vec<PathBuf>,
    /// How the reboot went, if one was requested
    pub reboot: RebootState,
    /// Remote address the bundles were served from
    pub endpoint: TunnelEndpoint,
}

/// Pushes the bundles of one [`UploadJob`] to a device
pub struct Uploader<C: Connector> {
    job: UploadJob,
    connector: C,
    config: PushConfig,
    progress: MultiProgress,
    sink: Option<Arc<dyn OutputSink>>,
}

impl<C: Connector> Uploader<C> {
    pub fn new(job: UploadJob, connector: C, config: PushConfig) -> Self {
        Self {
            job,
            connector,
            config,
            progress: MultiProgress::new(),
            sink: None,
        }
    }

    /// Draw progress bars into `progress` instead of stderr
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Send remote output to `sink` instead of the console
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Execute the job.
    ///
    /// Fails before any network activity if a bundle cannot be stat'ed.
    /// Once connected, the transport is closed whether or not the run
    /// succeeds.
    pub async fn run(&self) -> Result<RunReport, UploadError> {
        let table = BundleSizeTable::stat(&self.job.bundles, &self.config.serve_root).await?;
        tracing::debug!("Checked {} bundle(s)", table.len());

        let sink = self.output_sink();

        let target = &self.job.target;
        let mut transport = self
            .connector
            .connect(target, &self.job.credentials)
            .await
            .map_err(|source| UploadError::Connect {
                target: target.to_string(),
                source,
            })?;
        sink.notice(&format!("connection to ssh://{} succeeded", target));

        let result = self.drive(&mut transport, table, sink).await;

        if let Err(e) = transport.close().await {
            tracing::debug!("Error closing transport: {}", e);
        }

        result
    }

    async fn drive(
        &self,
        transport: &mut C::Session,
        table: BundleSizeTable,
        sink: Arc<dyn OutputSink>,
    ) -> Result<RunReport, UploadError> {
        let listener = transport.open_tunnel().await.map_err(UploadError::Tunnel)?;
        let endpoint = listener.endpoint().clone();

        let table = Arc::new(table);
        let tracker = Arc::new(ProgressTracker::new(
            Arc::clone(&table),
            self.progress.clone(),
        ));
        let server = FileServer::new(
            &self.config.serve_root,
            Arc::clone(&tracker),
            self.config.only_bundles,
        );
        tokio::spawn(server.serve(listener));
        sink.notice(&format!("fileserver listening on remote: {}", endpoint));

        let runner =
            CommandRunner::new(Arc::clone(&sink)).with_timeout(self.config.command_timeout);

        let mut installed = Vec::with_capacity(table.len());
        for (index, bundle) in table.iter().enumerate() {
            let url = endpoint.bundle_url(&bundle.url_path);
            let command = format!(
                "{} {}",
                self.config.install_command,
                shell_escape::unix::escape(url.into())
            );
            tracing::debug!(
                "Installing bundle #{} {} ({} bytes)",
                index,
                bundle.path.display(),
                bundle.size
            );

            let result = runner.run(&*transport, &command).await;
            tracker.finish();
            result.map_err(|source| UploadError::Install {
                index,
                bundle: bundle.path.clone(),
                source,
            })?;

            installed.push(bundle.path.clone());
        }

        let reboot = if self.job.reboot_after {
            self.reboot(&runner, &*transport, sink.as_ref()).await?
        } else {
            RebootState::NotRequested
        };

        Ok(RunReport {
            installed,
            reboot,
            endpoint,
        })
    }

    async fn reboot(
        &self,
        runner: &CommandRunner,
        transport: &C::Session,
        sink: &dyn OutputSink,
    ) -> Result<RebootState, UploadError> {
        tracing::debug!("Reboot {}", RebootState::Requested);
        let result = runner.run(transport, &self.config.reboot_command).await;
        let state = RebootState::classify(&result);

        match result {
            Err(e) if !state.is_success() => Err(UploadError::Reboot(e)),
            _ => {
                if state == RebootState::LostConnection {
                    sink.notice("connection lost, device rebooting...");
                }
                Ok(state)
            }
        }
    }

    fn output_sink(&self) -> Arc<dyn OutputSink> {
        match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(ConsoleSink::new(self.progress.clone())),
        }
    }
}
