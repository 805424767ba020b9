//! Asynchronous report pipeline.
//!
//! ```text
//! JobSubmitter ──► JobQueue ──► JobDispatcher ──► Renderer + ArtifactStore
//!                                      │
//!                                      └──► CompletionQueue ──► CompletionObserver
//! ```
//!
//! - [`queue`]: bounded ingress queue, the only admission control.
//! - [`dispatcher`]: one task per job, each a fault boundary.
//! - [`completion`]: bounded channel of successfully rendered ids.
//! - [`observer`]: one task per completion running [`CompletionHook`]s.
//! - [`render`] / [`store`]: the rendering and persistence collaborators.
//! - [`status`]: sidecar status table for the query endpoint.
//!
//! [`Pipeline::start`] wires the pieces together and spawns both loops.

pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod observer;
pub mod queue;
pub mod render;
pub mod status;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use completion::{CompletionQueue, CompletionSignal};
pub use config::{AdmissionPolicy, PipelineConfig, RetryPolicy};
pub use dispatcher::JobDispatcher;
pub use observer::{CompletionHook, CompletionObserver};
pub use queue::{JobQueue, JobReceiver, JobSubmitter, SubmitError};
pub use render::{HtmlBarChartRenderer, RenderError, Renderer};
pub use status::{JobStatus, JobStatusTable};
pub use store::{ArtifactStore, FsArtifactStore};

/// Running dispatcher and observer loops.
pub struct Pipeline {
    dispatcher: Arc<JobDispatcher>,
    observer: Arc<CompletionObserver>,
    cancel: CancellationToken,
    dispatcher_task: JoinHandle<()>,
    observer_task: JoinHandle<()>,
}

impl Pipeline {
    /// Build both queues, spawn the dispatcher and an observer with the
    /// default hooks, and hand back the submitting side of the job queue.
    pub fn start(
        config: &PipelineConfig,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArtifactStore>,
        status: JobStatusTable,
    ) -> (JobSubmitter, Pipeline) {
        let observer = CompletionObserver::with_default_hooks(status.clone());
        Self::start_with_observer(config, renderer, store, status, observer)
    }

    pub fn start_with_observer(
        config: &PipelineConfig,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArtifactStore>,
        status: JobStatusTable,
        observer: CompletionObserver,
    ) -> (JobSubmitter, Pipeline) {
        let (submitter, jobs) =
            JobQueue::bounded(config.job_queue_capacity, config.admission_policy);
        let (publisher, completions) = CompletionQueue::bounded(config.completion_queue_capacity);

        let dispatcher = Arc::new(
            JobDispatcher::new(renderer, store, publisher, status)
                .with_retry(config.retry)
                .with_concurrency_limit(config.concurrency_limit),
        );
        let observer = Arc::new(observer);
        let cancel = CancellationToken::new();

        let dispatcher_task = {
            let dispatcher = Arc::clone(&dispatcher);
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.run(jobs, cancel).await })
        };
        let observer_task = {
            let observer = Arc::clone(&observer);
            let cancel = cancel.clone();
            tokio::spawn(async move { observer.run(completions, cancel).await })
        };

        tracing::info!(
            job_queue_capacity = config.job_queue_capacity,
            completion_queue_capacity = config.completion_queue_capacity,
            admission_policy = %config.admission_policy,
            "Report pipeline started",
        );

        (
            submitter,
            Pipeline {
                dispatcher,
                observer,
                cancel,
                dispatcher_task,
                observer_task,
            },
        )
    }

    /// Render workers currently running.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Drain and stop both loops.
    ///
    /// Every [`JobSubmitter`] must be dropped first so the job queue can
    /// close; buffered jobs are still rendered. Whatever has not finished by
    /// `timeout` is abandoned and both loops are cancelled.
    pub async fn shutdown(self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let Pipeline {
            dispatcher,
            observer,
            cancel,
            mut dispatcher_task,
            mut observer_task,
        } = self;

        if tokio::time::timeout_at(deadline, &mut dispatcher_task)
            .await
            .is_err()
        {
            tracing::warn!("Job queue did not drain before the shutdown deadline");
            cancel.cancel();
        }
        dispatcher
            .shutdown(deadline.saturating_duration_since(Instant::now()))
            .await;
        // Last publisher handle outside the workers; the observer sees the
        // completion queue close once it goes.
        drop(dispatcher);

        if tokio::time::timeout_at(deadline, &mut observer_task)
            .await
            .is_err()
        {
            tracing::warn!("Completion queue did not drain before the shutdown deadline");
            cancel.cancel();
        }
        observer
            .shutdown(deadline.saturating_duration_since(Instant::now()))
            .await;

        tracing::info!("Report pipeline stopped");
    }
}
