use crate::error::EnqueueError;
use crate::Job;
use async_channel::{Receiver, Sender, TrySendError};

/// Fixed-capacity FIFO of admitted jobs.
///
/// Producers call [`try_enqueue`](Self::try_enqueue), which never waits: it
/// either appends or hands the job back. Workers call
/// [`dequeue`](Self::dequeue), which waits while the queue is empty and open
/// and yields `None` once it has been closed and drained. Cloning gives
/// another handle to the same queue.
#[derive(Clone, Debug)]
pub struct AdmissionQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl AdmissionQueue {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = async_channel::bounded(capacity);
        AdmissionQueue { sender, receiver }
    }

    pub fn try_enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        self.sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(job) => EnqueueError::Full(job),
            TrySendError::Closed(job) => EnqueueError::Closed(job),
        })
    }

    pub async fn dequeue(&self) -> Option<Job> {
        self.receiver.recv().await.ok()
    }

    /// Stops admission. Jobs already queued can still be dequeued, and
    /// workers waiting on an empty queue are released.
    ///
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        self.sender.close()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(usize::MAX)
    }
}
