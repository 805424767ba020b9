//! Bounded ingress queue for report jobs.
//!
//! The only admission control in the pipeline. Producers hold a cloneable
//! [`JobSubmitter`]; the dispatcher owns the single [`JobReceiver`]. When the
//! last submitter is dropped the receiver drains what is buffered and then
//! yields `None`.

use plotbuilder_core::job::Job;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::AdmissionPolicy;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Job queue is full (capacity {capacity})")]
    Overloaded { capacity: usize },

    #[error("Job queue is closed")]
    Closed,
}

pub struct JobQueue;

impl JobQueue {
    /// Create a FIFO job queue holding at most `capacity` pending jobs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn bounded(capacity: usize, policy: AdmissionPolicy) -> (JobSubmitter, JobReceiver) {
        assert!(capacity > 0, "job queue capacity must be at least 1");
        let (tx, rx) = mpsc::channel(capacity);
        (JobSubmitter { tx, policy }, JobReceiver { rx })
    }
}

/// Producer half of the job queue.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    tx: mpsc::Sender<Job>,
    policy: AdmissionPolicy,
}

impl JobSubmitter {
    /// Enqueue `job` according to the admission policy.
    ///
    /// Under [`AdmissionPolicy::Reject`] a full queue fails immediately.
    /// Under [`AdmissionPolicy::Block`] the caller waits for a free slot.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        match self.policy {
            AdmissionPolicy::Reject => self.tx.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => SubmitError::Overloaded {
                    capacity: self.capacity(),
                },
                TrySendError::Closed(_) => SubmitError::Closed,
            }),
            AdmissionPolicy::Block => self.tx.send(job).await.map_err(|_| SubmitError::Closed),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Jobs buffered and not yet claimed by the dispatcher.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the job queue.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
}

impl JobReceiver {
    /// Wait for the next job. `None` once every submitter is gone and the
    /// buffer is empty.
    pub async fn next(&mut self) -> Option<Job> {
        self.rx.recv().await
    }
}
