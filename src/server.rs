use crate::config::ConfigContext;
use crate::media::FfmpegTranscoder;
use crate::pool::WorkerPool;
use crate::state::AppState;
use crate::storage::MediaStore;
use crate::{http, ingest};
use anyhow::{Context, Error};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::*;

/// Runs the whole service until `cancel_token` fires or a listener fails.
///
/// Order of shutdown: both listeners stop accepting, then the worker pool
/// closes its queue and drains every job admitted before that point. The
/// first listener error, if any, is returned after the drain.
pub async fn serve(config: ConfigContext, cancel_token: CancellationToken) -> Result<(), Error> {
    config.validate()?;

    let store = MediaStore::new(&config.uploads);
    store
        .ensure()
        .await
        .with_context(|| format!("Failed to create upload directory {:?}", store.root()))?;

    let transcoder = FfmpegTranscoder::new(&config.ffmpeg);
    match transcoder.locate() {
        Some(path) => debug!(message = "Using transcoder", path = ?path),
        None => warn!(
            message = "Transcoder not found, every job will fail to process",
            program = ?config.ffmpeg
        ),
    }

    let mut pool = WorkerPool::new(config.workers, config.queue, Arc::new(transcoder), store.clone());
    pool.start();

    let state = AppState::new(store, pool.queue());
    let result = run_listeners(&config, state, cancel_token).await;

    info!("Listeners stopped, draining worker pool");
    pool.stop().await?;

    info!("Server stopped.");
    result
}

async fn run_listeners(
    config: &ConfigContext,
    state: AppState,
    cancel_token: CancellationToken,
) -> Result<(), Error> {
    let ingest_addr = SocketAddr::new(config.bind, config.port);
    let http_addr = SocketAddr::new(config.bind, config.http_port);

    let ingest_listener = TcpListener::bind(ingest_addr)
        .await
        .with_context(|| format!("Failed to bind streaming port {ingest_addr}"))?;
    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {http_addr}"))?;

    let mut listeners = JoinSet::new();
    listeners.spawn(
        run_listener(ingest_listener, ingest::router(state.clone()), cancel_token.clone())
            .instrument(info_span!("ingest")),
    );
    listeners.spawn(
        run_listener(
            http_listener,
            http::router(state, &config.static_dir, config.max_upload_bytes()),
            cancel_token.clone(),
        )
        .instrument(info_span!("http")),
    );

    let mut first_error = None;
    while let Some(joined) = listeners.join_next().await {
        let outcome = joined.map_err(Error::from).and_then(|result| result);
        if let Err(err) = outcome {
            error!(message = "Listener failed", error = ?err);
            cancel_token.cancel();
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn run_listener(
    listener: TcpListener,
    router: Router,
    cancel_token: CancellationToken,
) -> Result<(), Error> {
    info!(message = "Listening", addr = ?listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await?;

    debug!("Listener shut down");
    Ok(())
}
