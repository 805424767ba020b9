#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use plotbuilder_api::config::{LogFormat, ServerConfig};
use plotbuilder_api::router::build_app_router;
use plotbuilder_api::state::AppState;
use plotbuilder_pipeline::{
    FsArtifactStore, JobQueue, JobReceiver, JobStatusTable, JobSubmitter, Pipeline, PipelineConfig,
    Renderer,
};
use tempfile::TempDir;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".parse().unwrap()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        reports_dir: PathBuf::from("graphs"),
        pipeline: PipelineConfig::default(),
        log_format: LogFormat::Pretty,
    }
}

/// Router over a bare job queue with nothing draining it.
///
/// Lets tests see exactly what ingress enqueued.
pub struct QueueApp {
    pub router: Router,
    pub jobs: JobSubmitter,
    pub status: JobStatusTable,
    pub receiver: JobReceiver,
}

pub fn build_queue_app(config: ServerConfig) -> QueueApp {
    let (jobs, receiver) = JobQueue::bounded(
        config.pipeline.job_queue_capacity,
        config.pipeline.admission_policy,
    );
    let status = JobStatusTable::new();

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs: jobs.clone(),
        status: status.clone(),
    };

    QueueApp {
        router: build_app_router(state, &config),
        jobs,
        status,
        receiver,
    }
}

/// Router backed by a running pipeline writing into a temporary directory.
pub struct PipelineApp {
    pub router: Router,
    pub status: JobStatusTable,
    pub pipeline: Pipeline,
    pub dir: TempDir,
}

pub fn build_pipeline_app(renderer: Arc<dyn Renderer>) -> PipelineApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.reports_dir = dir.path().to_path_buf();

    let status = JobStatusTable::new();
    let (jobs, pipeline) = Pipeline::start(
        &config.pipeline,
        renderer,
        Arc::new(FsArtifactStore::new(dir.path())),
        status.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        status: status.clone(),
    };

    PipelineApp {
        router: build_app_router(state, &config),
        status,
        pipeline,
        dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, method: Method, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str, body: &str) -> Response {
    send(app, Method::POST, uri, body).await
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, "").await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the status route until `uuid` reaches `state`, returning the last
/// status payload.
pub async fn wait_for_state(app: &Router, uuid: &str, state: &str) -> serde_json::Value {
    let uri = format!("/api/report/{uuid}/status");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(app, &uri).await;
            if response.status().is_success() {
                let json = body_json(response).await;
                if json["data"]["state"] == state {
                    return json;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for report state")
}

pub const SAMPLE_BODY: &str =
    r#"{"data":{"alice":[100,20],"bob":[50,70]},"uuid":"job-1"}"#;
