//! Bounded channel of successfully rendered jobs.
//!
//! Workers publish one [`CompletionSignal`] per rendered job; the
//! [`CompletionObserver`](crate::observer::CompletionObserver) consumes them.
//! A full queue makes the publishing worker wait, not the request handler.

use std::path::PathBuf;

use plotbuilder_core::job::CorrelationId;
use plotbuilder_core::types::Timestamp;
use tokio::sync::mpsc;

/// A job whose artifact has been persisted.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub correlation_id: CorrelationId,
    /// Where the artifact was written.
    pub artifact: PathBuf,
    /// Render attempts it took, starting at 1.
    pub attempts: u32,
    pub completed_at: Timestamp,
}

impl CompletionSignal {
    pub fn new(correlation_id: CorrelationId, artifact: PathBuf, attempts: u32) -> Self {
        Self {
            correlation_id,
            artifact,
            attempts,
            completed_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The observer is gone. The undelivered signal is handed back.
    #[error("Completion queue is closed")]
    Closed(CompletionSignal),
}

pub struct CompletionQueue;

impl CompletionQueue {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn bounded(capacity: usize) -> (CompletionPublisher, CompletionReceiver) {
        assert!(capacity > 0, "completion queue capacity must be at least 1");
        let (tx, rx) = mpsc::channel(capacity);
        (CompletionPublisher { tx }, CompletionReceiver { rx })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionPublisher {
    tx: mpsc::Sender<CompletionSignal>,
}

impl CompletionPublisher {
    /// Publish a signal, waiting while the queue is full.
    pub async fn publish(&self, signal: CompletionSignal) -> Result<(), PublishError> {
        self.tx
            .send(signal)
            .await
            .map_err(|mpsc::error::SendError(signal)| PublishError::Closed(signal))
    }
}

#[derive(Debug)]
pub struct CompletionReceiver {
    rx: mpsc::Receiver<CompletionSignal>,
}

impl CompletionReceiver {
    pub async fn next(&mut self) -> Option<CompletionSignal> {
        self.rx.recv().await
    }
}
