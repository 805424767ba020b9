//! Completion observer: drains the completion queue and runs side effects.
//!
//! Same shape as the dispatcher. Each signal gets its own task that runs
//! every registered [`CompletionHook`] in order. Hook errors are logged and
//! go no further. There is no ordering guarantee between signals.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::completion::{CompletionReceiver, CompletionSignal};
use crate::status::JobStatusTable;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Side effect performed once per completed job.
#[async_trait]
pub trait CompletionHook: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn on_complete(&self, signal: &CompletionSignal) -> Result<(), HookError>;
}

/// Emits one `info` line per completed report.
#[derive(Debug, Default)]
pub struct LogCompletionHook;

#[async_trait]
impl CompletionHook for LogCompletionHook {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_complete(&self, signal: &CompletionSignal) -> Result<(), HookError> {
        tracing::info!(
            uuid = %signal.correlation_id,
            artifact = %signal.artifact.display(),
            attempts = signal.attempts,
            "Report completed",
        );
        Ok(())
    }
}

/// Marks the job `done` in the status table.
#[derive(Debug, Clone)]
pub struct StatusCompletionHook {
    status: JobStatusTable,
}

impl StatusCompletionHook {
    pub fn new(status: JobStatusTable) -> Self {
        Self { status }
    }
}

#[async_trait]
impl CompletionHook for StatusCompletionHook {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn on_complete(&self, signal: &CompletionSignal) -> Result<(), HookError> {
        self.status
            .mark_done(
                &signal.correlation_id,
                signal.artifact.clone(),
                signal.attempts,
            )
            .await;
        Ok(())
    }
}

pub struct CompletionObserver {
    hooks: Arc<Vec<Arc<dyn CompletionHook>>>,
    tracker: TaskTracker,
}

impl CompletionObserver {
    pub fn new(hooks: Vec<Arc<dyn CompletionHook>>) -> Self {
        Self {
            hooks: Arc::new(hooks),
            tracker: TaskTracker::new(),
        }
    }

    /// Observer with the default hooks: status update, then log line.
    pub fn with_default_hooks(status: JobStatusTable) -> Self {
        Self::new(vec![
            Arc::new(StatusCompletionHook::new(status)),
            Arc::new(LogCompletionHook),
        ])
    }

    /// Run until the completion queue closes or `cancel` fires.
    pub async fn run(&self, mut completions: CompletionReceiver, cancel: CancellationToken) {
        tracing::info!(hooks = self.hooks.len(), "Completion observer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Completion observer shutting down");
                    break;
                }
                next = completions.next() => match next {
                    Some(signal) => self.observe(signal),
                    None => {
                        tracing::info!("Completion queue closed, observer stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Wait for in-flight hook tasks. `false` if `timeout` elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    fn observe(&self, signal: CompletionSignal) {
        let hooks = Arc::clone(&self.hooks);
        self.tracker.spawn(async move {
            for hook in hooks.iter() {
                if let Err(e) = hook.on_complete(&signal).await {
                    tracing::error!(
                        uuid = %signal.correlation_id,
                        hook = hook.name(),
                        error = %e,
                        "Completion hook failed",
                    );
                }
            }
        });
    }
}
