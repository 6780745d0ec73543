use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub temp_dir: ComponentHealth,
    pub queue: QueueHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct QueueHealth {
    pub status: String,
    pub depth: usize,
    pub capacity: usize,
}

/// GET /health — temp-root and queue status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    // The artifact root must exist and be a directory for the pipeline to
    // function at all.
    let temp_check = match tokio::fs::metadata(state.artifacts.root()).await {
        Ok(meta) if meta.is_dir() => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        _ => ComponentHealth {
            status: "error".to_string(),
            latency_ms: None,
        },
    };

    let depth = state.queue.depth().await;
    let capacity = state.queue.capacity();
    let queue_check = QueueHealth {
        status: if depth < capacity { "ok" } else { "saturated" }.to_string(),
        depth,
        capacity,
    };

    let all_healthy = temp_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            temp_dir: temp_check,
            queue: queue_check,
        },
    };

    (status_code, Json(response))
}
