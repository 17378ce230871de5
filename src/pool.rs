use crate::media::Transcoder;
use crate::queue::AdmissionQueue;
use crate::storage::MediaStore;
use crate::worker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::*;

/// Fixed set of workers draining one [`AdmissionQueue`].
///
/// The queue and the workers share a lifetime: both are created here, and
/// [`stop`](Self::stop) closes the queue, lets the workers finish what was
/// admitted, and joins them.
pub struct WorkerPool {
    workers_count: usize,
    queue: AdmissionQueue,
    transcoder: Arc<dyn Transcoder>,
    store: MediaStore,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

/// Decrements the active-worker count when a worker task ends, however it
/// ends.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(
        workers_count: usize,
        capacity: usize,
        transcoder: Arc<dyn Transcoder>,
        store: MediaStore,
    ) -> Self {
        WorkerPool {
            workers_count,
            queue: AdmissionQueue::new(capacity),
            transcoder,
            store,
            workers: Vec::with_capacity(workers_count),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle for producers. Every component that admits work gets one of
    /// these explicitly.
    pub fn queue(&self) -> AdmissionQueue {
        self.queue.clone()
    }

    pub fn workers_count(&self) -> usize {
        self.workers_count
    }

    /// Number of worker tasks that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawns the workers. Does nothing if they are already running.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            warn!("Worker pool already started");
            return;
        }

        for id in 1..=self.workers_count {
            self.active.fetch_add(1, Ordering::SeqCst);
            let guard = ActiveGuard(self.active.clone());
            let queue = self.queue.clone();
            let transcoder = self.transcoder.clone();
            let store = self.store.clone();

            let join_handle = tokio::spawn(
                async move {
                    let _guard = guard;
                    worker::start(queue, transcoder, store).await;
                }
                .instrument(info_span!("worker", id)),
            );
            self.workers.push(join_handle);
        }

        info!(
            message = "Worker pool started",
            workers = self.workers_count,
            capacity = self.queue.capacity()
        );
    }

    /// Closes the queue and waits until every worker has drained it and
    /// exited. Meant to be called once; a second call finds nothing left to
    /// join.
    ///
    /// Jobs admitted into a pool that was never started are still
    /// processed: the workers are spawned here to drain them.
    pub async fn stop(&mut self) -> Result<(), JoinError> {
        self.queue.close();
        if self.workers.is_empty() && !self.queue.is_empty() {
            debug!("Pool stopped before start, spawning workers to drain");
            self.start();
        }
        debug!(message = "Queue closed, draining", pending = self.queue.len());

        // Wait for all workers to complete
        futures::future::join_all(self.workers.drain(..))
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        info!("Worker pool stopped.");
        Ok(())
    }
}
