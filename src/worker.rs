use crate::error::MediaResult;
use crate::media::Transcoder;
use crate::queue::AdmissionQueue;
use crate::storage::MediaStore;
use crate::Job;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::*;

/// Paths of the artifacts produced for one job.
#[derive(Debug)]
pub(crate) struct Artifacts {
    pub preview: PathBuf,
    pub thumbnail: PathBuf,
}

/// Runs until the queue is closed and drained. A job that fails is logged
/// and dropped; the loop always moves on to the next one.
pub(crate) async fn start(
    queue: AdmissionQueue,
    transcoder: Arc<dyn Transcoder>,
    store: MediaStore,
) {
    while let Some(job) = queue.dequeue().await {
        match process(&job, transcoder.as_ref(), &store).await {
            Ok(artifacts) => {
                info!(
                    message = "Video processed",
                    video_id = %job.video_id,
                    preview = ?artifacts.preview,
                    thumbnail = ?artifacts.thumbnail
                );
            }
            Err(err) => {
                error!(
                    message = "Artifact generation failed",
                    video_id = %job.video_id,
                    step = %err.step(),
                    error = %err
                );
            }
        }
    }
    info!("Worker stopped.");
}

#[instrument(skip_all, fields(job_id = %job.id, video_id = %job.video_id))]
async fn process(job: &Job, transcoder: &dyn Transcoder, store: &MediaStore) -> MediaResult<Artifacts> {
    info!(message = "Processing video", file = ?job.filename);

    let preview = store.preview_path(&job.video_id);
    transcoder.preview(&job.filename, &preview).await?;

    let thumbnail = store.thumbnail_path(&job.video_id);
    transcoder.thumbnail(&job.filename, &thumbnail).await?;

    Ok(Artifacts { preview, thumbnail })
}
