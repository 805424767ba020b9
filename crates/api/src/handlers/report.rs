//! Handlers for the `/report` resource.
//!
//! Ingress is fire-and-forget: a request is answered as soon as its job is
//! queued. Render outcomes are only visible through the status route.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use plotbuilder_core::error::CoreError;
use plotbuilder_core::job::{decode_report_request, CorrelationId};
use plotbuilder_core::status::JobState;
use plotbuilder_pipeline::{JobStatus, JobStatusTable};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a `202 Accepted` ingress response.
#[derive(Debug, Serialize)]
pub struct ReportAccepted {
    pub uuid: CorrelationId,
    pub status: JobState,
}

/// Body of a status query response.
#[derive(Debug, Serialize)]
pub struct ReportStatus {
    pub uuid: CorrelationId,
    #[serde(flatten)]
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Marks an id `pending` and puts its previous entry back unless disarmed.
///
/// The request future can be dropped while `submit` waits for a slot
/// (request timeout, client gone). No job was queued then, so the drop path
/// restores the entry on a spawned task since it cannot await.
struct PendingEntry {
    status: JobStatusTable,
    id: CorrelationId,
    previous: Option<Option<JobStatus>>,
}

impl PendingEntry {
    async fn mark(status: &JobStatusTable, id: &CorrelationId) -> Self {
        let previous = status.mark_pending(id).await;
        Self {
            status: status.clone(),
            id: id.clone(),
            previous: Some(previous),
        }
    }

    /// The job is queued; the pending entry stays.
    fn disarm(mut self) {
        self.previous = None;
    }

    async fn rollback(mut self) {
        if let Some(previous) = self.previous.take() {
            self.status.restore(&self.id, previous).await;
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        tracing::debug!(uuid = %self.id, "Ingress cancelled before enqueue, restoring status");

        let status = self.status.clone();
        let id = self.id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { status.restore(&id, previous).await });
        }
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// POST /api/report/generate
///
/// Decode the body, enqueue exactly one render job and return 202 without
/// waiting for it. The body is taken as raw bytes so every decoding problem
/// is a 400, whatever the content type.
pub async fn generate_report(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let job = decode_report_request(&body)?;
    let id = job.correlation_id.clone();
    let datapoints = job.payload.len();

    // Pending goes in first so a fast worker can never be overwritten by it.
    let pending = PendingEntry::mark(&state.status, &id).await;

    match state.jobs.submit(job).await {
        Ok(()) => pending.disarm(),
        Err(e) => {
            pending.rollback().await;
            tracing::warn!(uuid = %id, error = %e, "Report job rejected");
            return Err(e.into());
        }
    }

    tracing::info!(
        uuid = %id,
        datapoints,
        queue_depth = state.jobs.depth(),
        "Report job queued",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ReportAccepted {
                uuid: id,
                status: JobState::Pending,
            },
        }),
    ))
}

/// Any method other than POST on the generate route.
pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/report/{uuid}/status
///
/// Last known state of the most recent job submitted under `uuid`.
pub async fn report_status(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> AppResult<Json<DataResponse<ReportStatus>>> {
    let id = CorrelationId::parse(uuid)?;

    let status = state
        .status
        .get(&id)
        .await
        .ok_or_else(|| CoreError::NotFound {
            entity: "Report",
            id: id.to_string(),
        })?;

    Ok(Json(DataResponse {
        data: ReportStatus { uuid: id, status },
    }))
}
