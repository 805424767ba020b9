//! In-memory job status table.
//!
//! Sidecar to the pipeline: ingress, workers and the completion observer
//! write to it, the status endpoint reads it. The queues never consult it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use plotbuilder_core::job::CorrelationId;
use plotbuilder_core::status::JobState;
use plotbuilder_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::RwLock;

/// Last known state of one correlation id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Render attempts started so far.
    pub attempts: u32,
    pub artifact: Option<PathBuf>,
    pub error: Option<String>,
    pub updated_at: Timestamp,
}

impl JobStatus {
    fn pending() -> Self {
        Self {
            state: JobState::Pending,
            attempts: 0,
            artifact: None,
            error: None,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Shared `CorrelationId -> JobStatus` map.
///
/// Cheap to clone. Ids are not unique, so a resubmitted id simply takes over
/// the existing entry.
// TODO: evict terminal entries after a retention window; today the table
// grows with every distinct id for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct JobStatusTable {
    entries: Arc<RwLock<HashMap<CorrelationId, JobStatus>>>,
}

impl JobStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly accepted job. Returns the entry it replaced so a
    /// rejected submission can be rolled back with [`restore`](Self::restore).
    pub async fn mark_pending(&self, id: &CorrelationId) -> Option<JobStatus> {
        self.entries
            .write()
            .await
            .insert(id.clone(), JobStatus::pending())
    }

    /// Put back the entry that [`mark_pending`](Self::mark_pending) replaced,
    /// or drop the id entirely if there was none.
    pub async fn restore(&self, id: &CorrelationId, previous: Option<JobStatus>) {
        let mut entries = self.entries.write().await;
        match previous {
            Some(status) => {
                entries.insert(id.clone(), status);
            }
            None => {
                entries.remove(id);
            }
        }
    }

    pub async fn mark_running(&self, id: &CorrelationId, attempt: u32) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.clone()).or_insert_with(JobStatus::pending);
        entry.state = JobState::Running;
        entry.attempts = attempt;
        entry.error = None;
        entry.updated_at = chrono::Utc::now();
    }

    pub async fn mark_done(&self, id: &CorrelationId, artifact: PathBuf, attempts: u32) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.clone()).or_insert_with(JobStatus::pending);
        entry.state = JobState::Done;
        entry.attempts = attempts;
        entry.artifact = Some(artifact);
        entry.error = None;
        entry.updated_at = chrono::Utc::now();
    }

    /// Keeps the attempt count recorded by the last `mark_running`.
    pub async fn mark_failed(&self, id: &CorrelationId, error: impl Into<String>) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.clone()).or_insert_with(JobStatus::pending);
        entry.state = JobState::Failed;
        entry.error = Some(error.into());
        entry.updated_at = chrono::Utc::now();
    }

    pub async fn get(&self, id: &CorrelationId) -> Option<JobStatus> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CorrelationId {
        CorrelationId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn walks_through_lifecycle() {
        let table = JobStatusTable::new();
        let job = id("job-1");

        assert!(table.mark_pending(&job).await.is_none());
        assert_eq!(table.get(&job).await.unwrap().state, JobState::Pending);

        table.mark_running(&job, 1).await;
        let running = table.get(&job).await.unwrap();
        assert_eq!(running.state, JobState::Running);
        assert_eq!(running.attempts, 1);

        table.mark_done(&job, PathBuf::from("graphs/job-1.html"), 1).await;
        let done = table.get(&job).await.unwrap();
        assert_eq!(done.state, JobState::Done);
        assert_eq!(done.artifact, Some(PathBuf::from("graphs/job-1.html")));
    }

    #[tokio::test]
    async fn failure_keeps_attempt_count_and_message() {
        let table = JobStatusTable::new();
        let job = id("job-2");

        table.mark_pending(&job).await;
        table.mark_running(&job, 3).await;
        table.mark_failed(&job, "disk full").await;

        let failed = table.get(&job).await.unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.attempts, 3);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn restore_rolls_back_a_rejected_submission() {
        let table = JobStatusTable::new();
        let fresh = id("fresh");
        let reused = id("reused");

        let previous = table.mark_pending(&fresh).await;
        table.restore(&fresh, previous).await;
        assert!(table.get(&fresh).await.is_none());

        table.mark_pending(&reused).await;
        table.mark_done(&reused, PathBuf::from("reused.html"), 1).await;
        let previous = table.mark_pending(&reused).await;
        table.restore(&reused, previous).await;
        assert_eq!(table.get(&reused).await.unwrap().state, JobState::Done);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let table = JobStatusTable::new();
        assert!(table.get(&id("nope")).await.is_none());
        assert!(table.is_empty().await);
    }
}
