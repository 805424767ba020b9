//! Route definitions for the `/report` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::report;
use crate::state::AppState;

/// Routes mounted at `/report`.
///
/// ```text
/// POST   /generate          -> generate_report
/// *      /generate          -> method_not_allowed (405)
/// GET    /{uuid}/status     -> report_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/generate",
            post(report::generate_report).fallback(report::method_not_allowed),
        )
        .route("/{uuid}/status", get(report::report_status))
}
