pub mod health;
pub mod report;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /report/generate                 submit a report job (POST only)
/// /report/{uuid}/status            job status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/report", report::router())
}
