//! Per-upload receive state machine.
//!
//! ```text
//! Idle --first chunk--> Receiving --chunk--> Receiving
//!                           |
//!                           +--finish--> Admitted | Rejected
//!                           +--error / abort--> Aborted
//! ```
//!
//! The destination file is created on the first chunk and closed on every
//! exit path. Creation is exclusive: an upload never reuses a file that
//! already exists under its id. A rejected upload removes its file; an
//! aborted one leaves whatever was written. Only an admitted session
//! produces a [`Job`].

use std::fmt::Display;
use std::path::PathBuf;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{EnqueueError, SessionError};
use crate::queue::AdmissionQueue;
use crate::storage::MediaStore;
use crate::Job;

/// Id prefix for uploads arriving over the streaming endpoint.
pub const STREAM_PREFIX: &str = "video_";
/// Id prefix for uploads arriving through the HTTP form.
pub const WEB_PREFIX: &str = "video_web_";

const SEPARATORS: &[char] = &['/', '\\'];

/// Derives the storage id of an upload from its client-supplied filename.
///
/// Only the last path component is kept, so the id can never point outside
/// the storage root. The same input always yields the same id.
pub fn derive_video_id(prefix: &str, filename: &str) -> String {
    let base = filename
        .trim_end_matches(SEPARATORS)
        .rsplit(SEPARATORS)
        .next()
        .unwrap_or_default();

    let base = match base {
        "" | "." | ".." => "upload",
        base => base,
    };

    format!("{prefix}{base}")
}

/// Outcome of a session whose job was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub video_id: String,
    pub size: u64,
}

type Destination = Box<dyn AsyncWrite + Send + Unpin>;

enum State {
    Idle,
    Receiving {
        video_id: String,
        path: PathBuf,
        file: Destination,
        size: u64,
    },
    Closed,
}

pub struct UploadSession {
    prefix: &'static str,
    store: MediaStore,
    queue: AdmissionQueue,
    state: State,
}

impl UploadSession {
    pub fn new(store: MediaStore, queue: AdmissionQueue, prefix: &'static str) -> Self {
        UploadSession {
            prefix,
            store,
            queue,
            state: State::Idle,
        }
    }

    /// Id assigned on the first chunk, if any chunk has arrived.
    pub fn video_id(&self) -> Option<&str> {
        match &self.state {
            State::Receiving { video_id, .. } => Some(video_id),
            _ => None,
        }
    }

    /// Bytes written so far.
    pub fn size(&self) -> u64 {
        match &self.state {
            State::Receiving { size, .. } => *size,
            _ => 0,
        }
    }

    /// Appends one chunk. The first chunk creates the destination file,
    /// named after `filename`; later chunks ignore it.
    ///
    /// The file must not exist yet. An id that is already taken on disk
    /// (by an earlier or concurrent upload of the same name) fails with
    /// [`SessionError::Create`] and leaves the existing file untouched.
    ///
    /// On error the session is closed and must not be finished.
    pub async fn receive(&mut self, filename: &str, content: &[u8]) -> Result<(), SessionError> {
        if let State::Idle = self.state {
            let video_id = derive_video_id(self.prefix, filename);
            let path = self.store.source_path(&video_id);

            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let file = match opened {
                Ok(file) => file,
                Err(source) => {
                    self.state = State::Closed;
                    warn!(message = "Failed to create upload file", video_id = %video_id, error = %source);
                    return Err(SessionError::Create { path, source });
                }
            };

            self.begin(video_id, path, Box::new(file));
        }

        let written = match &mut self.state {
            State::Receiving { file, size, .. } => file
                .write_all(content)
                .await
                .map(|()| *size += content.len() as u64),
            _ => return Err(SessionError::Closed),
        };

        if let Err(source) = written {
            warn!(message = "Upload write failed", video_id = ?self.video_id(), error = %source);
            self.state = State::Closed;
            return Err(SessionError::Write(source));
        }

        Ok(())
    }

    fn begin(&mut self, video_id: String, path: PathBuf, file: Destination) {
        debug!(message = "Receiving upload", video_id = %video_id, path = ?path);
        self.state = State::Receiving {
            video_id,
            path,
            file,
            size: 0,
        };
    }

    /// Ends the stream: closes the file and tries to admit a job for it.
    ///
    /// Never waits on the queue. When the queue refuses the job, the file
    /// is removed and [`SessionError::QueueFull`] (or `QueueClosed` during
    /// shutdown) is returned.
    pub async fn finish(mut self) -> Result<Admitted, SessionError> {
        let (video_id, path, mut file, size) = match std::mem::replace(&mut self.state, State::Closed) {
            State::Receiving {
                video_id,
                path,
                file,
                size,
            } => (video_id, path, file, size),
            State::Idle => return Err(SessionError::Empty),
            State::Closed => return Err(SessionError::Closed),
        };

        let flushed = file.flush().await;
        drop(file);
        flushed.map_err(SessionError::Finalize)?;

        let (err, job) = match self.queue.try_enqueue(Job::new(path, video_id.clone())) {
            Ok(()) => {
                info!(message = "Upload queued", video_id = %video_id, size);
                return Ok(Admitted { video_id, size });
            }
            Err(EnqueueError::Full(job)) => (SessionError::QueueFull, job),
            Err(EnqueueError::Closed(job)) => (SessionError::QueueClosed, job),
        };

        warn!(message = "Upload dropped", video_id = %job.video_id, reason = %err);
        if let Err(remove_err) = tokio::fs::remove_file(&job.filename).await {
            warn!(message = "Failed to remove dropped upload", path = ?job.filename, error = %remove_err);
        }

        Err(err)
    }

    /// Gives up on the upload. Any open file is closed and kept; no job is
    /// created.
    pub fn abort(mut self, reason: impl Display) {
        if let State::Receiving { video_id, size, .. } = std::mem::replace(&mut self.state, State::Closed) {
            warn!(message = "Upload aborted", video_id = %video_id, size, reason = %reason);
        } else {
            debug!(message = "Upload aborted before any data", reason = %reason);
        }
    }
}
