//! Job dispatcher: drains the job queue and renders each job on its own task.
//!
//! Fan-out is one task per job. With no concurrency limit configured there
//! is no cap on in-flight renders, so peak concurrency is bounded only by how
//! fast the queue fills. A configured limit makes the dispatch loop wait for
//! a permit, which pushes backpressure back onto the job queue.
//!
//! Every worker is a fault boundary. Render errors, persist errors and panics
//! are logged with the correlation id and recorded as `failed` in the status
//! table; they never reach the dispatch loop or other workers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use plotbuilder_core::dataset::Dataset;
use plotbuilder_core::job::{CorrelationId, Job};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::completion::{CompletionPublisher, CompletionSignal, PublishError};
use crate::config::RetryPolicy;
use crate::queue::JobReceiver;
use crate::render::{panic_message, RenderError, Renderer};
use crate::status::JobStatusTable;
use crate::store::ArtifactStore;

pub struct JobDispatcher {
    worker: Worker,
    limiter: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
}

impl JobDispatcher {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArtifactStore>,
        completions: CompletionPublisher,
        status: JobStatusTable,
    ) -> Self {
        Self {
            worker: Worker {
                renderer,
                store,
                completions,
                status,
                retry: RetryPolicy::default(),
            },
            limiter: None,
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.worker.retry = retry;
        self
    }

    /// Cap simultaneously running workers. `None` or `Some(0)` means no cap.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Workers spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Run the dispatch loop until the job queue closes or `cancel` fires.
    pub async fn run(&self, mut jobs: JobReceiver, cancel: CancellationToken) {
        tracing::info!(
            concurrency_limit = self.limiter.as_ref().map(|s| s.available_permits()),
            max_attempts = self.worker.retry.max_attempts,
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                next = jobs.next() => match next {
                    Some(job) => self.dispatch(job).await,
                    None => {
                        tracing::info!("Job queue closed, dispatcher stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Stop accepting new workers and wait for in-flight ones.
    ///
    /// Returns `false` if `timeout` elapsed first; those workers keep running
    /// detached.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                in_flight = self.tracker.len(),
                "Timed out waiting for report workers"
            );
        }
        drained
    }

    async fn dispatch(&self, job: Job) {
        let permit = match &self.limiter {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        tracing::debug!(uuid = %job.correlation_id, "Job claimed by worker");

        let worker = self.worker.clone();
        self.tracker.spawn(async move {
            worker.supervise(job).await;
            drop(permit);
        });
    }
}

/// Everything one job execution needs. Cloned per job.
#[derive(Clone)]
struct Worker {
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn ArtifactStore>,
    completions: CompletionPublisher,
    status: JobStatusTable,
    retry: RetryPolicy,
}

impl Worker {
    /// Run [`process`](Self::process) on its own task so that even a panic
    /// outside the renderer ends here as a recorded failure.
    async fn supervise(self, job: Job) {
        let id = job.correlation_id.clone();
        let status = self.status.clone();

        if let Err(e) = tokio::spawn(self.process(job)).await {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                "report worker was cancelled".to_string()
            };
            tracing::error!(uuid = %id, error = %reason, "Report worker aborted");
            status
                .mark_failed(&id, RenderError::Panicked(reason).to_string())
                .await;
        }
    }

    async fn process(self, job: Job) {
        let Job {
            correlation_id: id,
            payload,
            ..
        } = job;
        let payload = Arc::new(payload);
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.status.mark_running(&id, attempt).await;

            match self.attempt(&id, &payload).await {
                Ok(artifact) => {
                    tracing::debug!(uuid = %id, attempt, artifact = %artifact.display(), "Report rendered");
                    self.complete(CompletionSignal::new(id, artifact, attempt))
                        .await;
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        uuid = %id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Report render failed, retrying",
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    tracing::error!(
                        uuid = %id,
                        attempts = attempt,
                        error = %e,
                        "Report render failed",
                    );
                    self.status.mark_failed(&id, e.to_string()).await;
                    return;
                }
            }
        }
    }

    /// Render on the blocking pool, then persist.
    async fn attempt(
        &self,
        id: &CorrelationId,
        payload: &Arc<Dataset>,
    ) -> Result<PathBuf, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        let render_id = id.clone();
        let dataset = Arc::clone(payload);

        let artifact =
            tokio::task::spawn_blocking(move || renderer.render(&render_id, &dataset)).await??;

        self.store.persist(id, &artifact).await
    }

    async fn complete(&self, signal: CompletionSignal) {
        if let Err(PublishError::Closed(signal)) = self.completions.publish(signal).await {
            tracing::warn!(
                uuid = %signal.correlation_id,
                "Completion queue closed, recording completion directly",
            );
            self.status
                .mark_done(&signal.correlation_id, signal.artifact, signal.attempts)
                .await;
        }
    }
}
