use std::net::SocketAddr;
use std::sync::Arc;

use plotbuilder_api::config::{LogFormat, ServerConfig};
use plotbuilder_api::router::build_app_router;
use plotbuilder_api::state::AppState;
use plotbuilder_pipeline::{FsArtifactStore, HtmlBarChartRenderer, JobStatusTable, Pipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    // Read before tracing is up only to pick the log format; errors are
    // reported once the subscriber exists.
    let config = ServerConfig::from_env();
    let log_format = config
        .as_ref()
        .map(|c| c.log_format)
        .unwrap_or_default();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "plotbuilder_api=debug,plotbuilder_pipeline=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        reports_dir = %config.reports_dir.display(),
        "Loaded server configuration",
    );

    // --- Artifact store ---
    let store = FsArtifactStore::new(&config.reports_dir);
    if let Err(e) = store.ensure_root().await {
        tracing::error!(
            error = %e,
            reports_dir = %config.reports_dir.display(),
            "Failed to create reports directory",
        );
        std::process::exit(1);
    }

    // --- Report pipeline ---
    let status = JobStatusTable::new();
    let (jobs, pipeline) = Pipeline::start(
        &config.pipeline,
        Arc::new(HtmlBarChartRenderer::new()),
        Arc::new(store),
        status.clone(),
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        status,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = match config.host.parse() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    // The router owns the last job submitter; it is dropped when `serve`
    // returns, which closes the job queue.
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!(
        in_flight = pipeline.in_flight(),
        "Server stopped accepting connections, draining report pipeline",
    );
    pipeline.shutdown(config.shutdown_timeout()).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
