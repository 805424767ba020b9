use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use plotbuilder_core::error::CoreError;
use plotbuilder_pipeline::SubmitError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`SubmitError`] for admission
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`] to
/// produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `plotbuilder_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The job queue refused the job.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The route exists but not for this HTTP method.
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// An internal failure. The message is logged, never returned.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                CoreError::Decode(err) => (
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    format!("Malformed request body: {err}"),
                ),
            },

            // --- Admission ---
            AppError::Submit(err @ SubmitError::Overloaded { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED", err.to_string())
            }
            AppError::Submit(SubmitError::Closed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "Report service is shutting down".to_string(),
            ),

            // --- HTTP-specific errors ---
            AppError::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                format!("Method {method} not allowed"),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
