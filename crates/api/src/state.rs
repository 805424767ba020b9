use std::sync::Arc;

use plotbuilder_pipeline::{JobStatusTable, JobSubmitter};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable. Holds the job queue's submitting side, so the queue
/// only closes once every clone of the state is gone.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Producer side of the report job queue.
    pub jobs: JobSubmitter,
    /// Per-id job status, written by the pipeline and read by the status route.
    pub status: JobStatusTable,
}
