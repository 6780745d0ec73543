mod app_state;
mod config;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    artifacts::ArtifactStore,
    invoker::CommandInvoker,
    queue::JobQueue,
    store::ResultStore,
    sweeper::{self, RetentionPolicy},
    worker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing step-preview server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "convert_processing_seconds",
        "Time to render one conversion job"
    );
    metrics::describe_counter!("convert_jobs_total", "Total conversion jobs accepted");
    metrics::describe_counter!(
        "convert_jobs_completed",
        "Total conversion jobs completed successfully"
    );
    metrics::describe_counter!("convert_jobs_failed", "Total conversion jobs that failed");
    metrics::describe_gauge!(
        "convert_queue_depth",
        "Current number of queued conversion jobs"
    );

    // Prepare the artifact root
    let artifacts = ArtifactStore::new(&config.temp_dir);
    artifacts
        .ensure_root()
        .await
        .expect("Failed to create temp directory");

    let queue = Arc::new(JobQueue::new(config.queue_capacity));
    let store = Arc::new(ResultStore::new());
    let invoker = Arc::new(CommandInvoker::new(
        &config.converter_cmd,
        config.convert_timeout(),
    ));

    // Start the worker pool
    tracing::info!(workers = config.worker_count, "Starting conversion workers");
    worker::spawn_workers(
        config.worker_count,
        Arc::clone(&queue),
        Arc::clone(&store),
        invoker,
    );

    // Start the retention sweeper
    tracing::info!(
        interval_secs = config.sweep_interval_secs,
        max_age_secs = config.max_file_age_secs,
        "Starting retention sweeper"
    );
    sweeper::spawn_sweeper(
        config.temp_dir.clone(),
        RetentionPolicy::new(config.sweep_interval(), config.max_file_age()),
    );

    let bind_addr = config.bind_addr.clone();
    let max_body_bytes = config.max_body_bytes;
    let state = AppState::new(config, queue, store, artifacts);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/convert",
            post(routes::convert::submit_conversion).get(routes::convert::conversion_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    tracing::info!("Starting step-preview on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
