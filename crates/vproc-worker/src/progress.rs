//! Job update events for in-process subscribers.

use tokio::sync::broadcast;
use tracing::debug;

use vproc_models::{Job, JobUpdate};

/// Default number of buffered updates per subscriber.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Broadcast channel of [`JobUpdate`]s.
///
/// Publishing with no subscribers is not an error; slow subscribers may
/// miss updates and observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    tx: broadcast::Sender<JobUpdate>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_CAPACITY)
    }
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.tx.subscribe()
    }

    /// Publish the current state of `job`.
    pub fn publish(&self, job: &Job) {
        let update = JobUpdate::from(job);
        debug!(job_id = %update.job_id, status = %update.status, "Publishing job update");
        let _ = self.tx.send(update);
    }
}
