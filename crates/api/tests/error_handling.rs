//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use plotbuilder_api::error::AppError;
use plotbuilder_core::error::CoreError;
use plotbuilder_pipeline::SubmitError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Report",
        id: "job-1".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Report with id job-1 not found");
}

// ---------------------------------------------------------------------------
// Test: validation and decode failures map to 400 with BAD_REQUEST code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("uuid must not be empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "uuid must not be empty");
}

#[tokio::test]
async fn decode_error_returns_400() {
    let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = AppError::Core(CoreError::Decode(decode));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Malformed request body"));
}

// ---------------------------------------------------------------------------
// Test: admission failures map to 503
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overloaded_returns_503() {
    let err = AppError::Submit(SubmitError::Overloaded { capacity: 10 });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "OVERLOADED");
    assert_eq!(json["error"], "Job queue is full (capacity 10)");
}

#[tokio::test]
async fn closed_queue_returns_503_unavailable() {
    let err = AppError::from(SubmitError::Closed);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Test: AppError::MethodNotAllowed maps to 405
// ---------------------------------------------------------------------------

#[tokio::test]
async fn method_not_allowed_returns_405() {
    let err = AppError::MethodNotAllowed("GET".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["code"], "METHOD_NOT_ALLOWED");
    assert_eq!(json["error"], "Method GET not allowed");
}

// ---------------------------------------------------------------------------
// Test: internal errors map to 500 and sanitize the message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("handler panicked reading /srv/secret".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
