use axum::extract::State;
use axum::{routing::get, Json, Router};
use plotbuilder_pipeline::AdmissionPolicy;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the job queue is full.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub queue: QueueHealth,
    pub render: RenderSettings,
}

#[derive(Serialize)]
pub struct QueueHealth {
    /// Jobs buffered and not yet claimed by a worker.
    pub depth: usize,
    pub capacity: usize,
    pub policy: AdmissionPolicy,
}

#[derive(Serialize)]
pub struct RenderSettings {
    /// `null` when every job gets its own task with no cap.
    pub concurrency_limit: Option<usize>,
    pub max_attempts: u32,
}

/// GET /health -- returns service and job queue health plus render settings.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let jobs = &state.jobs;
    let status = if jobs.is_full() || jobs.is_closed() {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        queue: QueueHealth {
            depth: jobs.depth(),
            capacity: jobs.capacity(),
            policy: jobs.policy(),
        },
        render: RenderSettings {
            concurrency_limit: state.config.pipeline.concurrency_limit,
            max_attempts: state.config.pipeline.retry.max_attempts,
        },
    })
}

/// Mount health check routes (root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
