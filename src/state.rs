//! State shared by the ingestion and HTTP handlers.

use crate::queue::AdmissionQueue;
use crate::session::UploadSession;
use crate::storage::MediaStore;

/// Everything a request handler needs, handed in through axum's `State`.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: MediaStore,
    pub queue: AdmissionQueue,
}

impl AppState {
    pub fn new(store: MediaStore, queue: AdmissionQueue) -> Self {
        Self { store, queue }
    }

    /// Starts a fresh upload session bound to this state's queue and store.
    pub fn session(&self, prefix: &'static str) -> UploadSession {
        UploadSession::new(self.store.clone(), self.queue.clone(), prefix)
    }
}
