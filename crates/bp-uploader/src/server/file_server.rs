//! Static file serving with byte counting

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::TryStreamExt;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use percent_encoding::percent_decode_str;
use tower_http::services::ServeDir;

use bp_core::traits::TunnelListener;

use super::progress::ProgressTracker;

#[derive(Clone)]
struct TransferState {
    tracker: Arc<ProgressTracker>,
    only_bundles: bool,
}

/// Serves a directory over tunneled connections and reports progress
#[derive(Clone)]
pub struct FileServer {
    router: Router,
}

impl FileServer {
    /// Serve `root`, feeding response sizes into `tracker`.
    ///
    /// With `only_bundles` set, paths missing from the tracker's bundle
    /// table are answered with 404 without touching the filesystem.
    pub fn new(root: impl AsRef<Path>, tracker: Arc<ProgressTracker>, only_bundles: bool) -> Self {
        let state = TransferState {
            tracker,
            only_bundles,
        };

        let router = Router::new()
            .fallback_service(ServeDir::new(root.as_ref()))
            .layer(middleware::from_fn_with_state(state, track_transfer));

        Self { router }
    }

    /// The underlying router
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept tunneled connections until the listener closes.
    ///
    /// Each connection is served on its own task; errors there are logged
    /// and never reach the caller.
    pub async fn serve(self, mut listener: TunnelListener) {
        while let Some(stream) = listener.accept().await {
            let service = TowerToHyperService::new(self.router.clone());

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!("Tunneled connection ended with error: {}", e);
                }
            });
        }

        tracing::debug!("Tunnel listener closed, file server stopped");
    }
}

async fn track_transfer(
    State(state): State<TransferState>,
    request: Request,
    next: Next,
) -> Response {
    let raw = request.uri().path().trim_start_matches('/');
    let path = percent_decode_str(raw).decode_utf8_lossy().into_owned();

    if state.only_bundles && !state.tracker.table().contains(&path) {
        tracing::warn!("Refusing request for non-bundle path /{}", path);
        return StatusCode::NOT_FOUND.into_response();
    }

    let bar = state.tracker.begin(&path);
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let counted = body
        .into_data_stream()
        .inspect_ok(move |chunk| bar.inc(chunk.len() as u64));

    Response::from_parts(parts, Body::from_stream(counted))
}
