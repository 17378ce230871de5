use std::path::PathBuf;

use uuid::Uuid;

pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod media;
pub mod pool;
pub mod proto;
pub mod queue;
pub mod server;
pub mod session;
pub mod state;
pub mod storage;
pub mod telemetry;
mod worker;

pub use error::{ApiError, EnqueueError, MediaError, SessionError};
pub use pool::WorkerPool;
pub use queue::AdmissionQueue;
pub use session::{Admitted, UploadSession};
pub use storage::MediaStore;

/// An admitted upload waiting for (or undergoing) preview generation.
///
/// Not `Clone`: a job moves through the queue and is owned by exactly one
/// worker once dequeued.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    /// Path of the persisted source file.
    pub filename: PathBuf,
    pub video_id: String,
}

impl Job {
    pub fn new(filename: impl Into<PathBuf>, video_id: impl Into<String>) -> Self {
        Job {
            id: Uuid::new_v4(),
            filename: filename.into(),
            video_id: video_id.into(),
        }
    }
}
