use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::convert::{
    ConvertAccepted, ConvertFailed, ConvertPending, ConvertResult, ErrorBody, RenderQuery,
    StatusQuery,
};
use crate::models::job::{Job, JobStatus};
use crate::services::ingress::{self, SubmitError};
use crate::services::store::TakeOutcome;

/// POST /convert — accept a STEP payload and schedule its conversion.
///
/// Returns the job id immediately; the conversion runs asynchronously.
pub async fn submit_conversion(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
    body: Bytes,
) -> Response {
    match ingress::submit(
        &body,
        &query,
        &state.config,
        &state.artifacts,
        &state.store,
        &state.queue,
    )
    .await
    {
        Ok(job_id) => {
            metrics::counter!("convert_jobs_total").increment(1);
            metrics::gauge!("convert_queue_depth").set(state.queue.depth().await as f64);
            (
                StatusCode::ACCEPTED,
                Json(ConvertAccepted {
                    job_id: job_id.simple().to_string(),
                    status: "pending".to_string(),
                    message: "conversion scheduled".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            let code = match &e {
                SubmitError::BadSignature | SubmitError::BadParameters { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SubmitError::QueueSaturated { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SubmitError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, Json(ErrorBody { error: e.to_string() })).into_response()
        }
    }
}

/// GET /convert?item_id=<id> — poll a job.
///
/// Pending jobs are reported and left untouched. Terminal jobs are consumed:
/// the record and both artifacts are gone once this handler has answered,
/// and the same id polls as unknown from then on.
pub async fn conversion_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(item_id) = query.item_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "missing item_id".to_string(),
            }),
        )
            .into_response();
    };

    // Ids are opaque tokens: anything that does not parse is simply a job
    // we do not track.
    let Ok(job_id) = Uuid::try_parse(&item_id) else {
        return unknown_job();
    };

    match state.store.take_terminal(job_id).await {
        TakeOutcome::Unknown => unknown_job(),
        TakeOutcome::Pending => (
            StatusCode::ACCEPTED,
            Json(ConvertPending {
                job_id: job_id.simple().to_string(),
                status: "in_progress".to_string(),
            }),
        )
            .into_response(),
        TakeOutcome::Taken(job) => consume_terminal(&state, job).await,
    }
}

fn unknown_job() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "unknown job".to_string(),
        }),
    )
        .into_response()
}

/// Build the terminal response and clean up. The record is already removed;
/// artifacts are deleted for both success and failure before returning.
async fn consume_terminal(state: &AppState, job: Job) -> Response {
    let job_id = job.id.simple().to_string();

    let response = match &job.status {
        JobStatus::Succeeded { .. } => match state.artifacts.read_output(job.id).await {
            Ok(bytes) if !bytes.is_empty() => {
                let image = base64::engine::general_purpose::STANDARD.encode(&bytes);
                (
                    StatusCode::OK,
                    Json(ConvertResult {
                        job_id,
                        status: "succeeded".to_string(),
                        image,
                    }),
                )
                    .into_response()
            }
            _ => (
                StatusCode::EXPECTATION_FAILED,
                Json(ErrorBody {
                    error: "conversion result is empty".to_string(),
                }),
            )
                .into_response(),
        },
        JobStatus::Failed { reason } => (
            StatusCode::BAD_REQUEST,
            Json(ConvertFailed {
                job_id,
                status: "failed".to_string(),
                kind: reason.kind,
                error: reason.message.clone(),
            }),
        )
            .into_response(),
        JobStatus::Pending => {
            tracing::error!(job_id = %job.id, "non-terminal job consumed from store");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    state.artifacts.remove_artifacts(job.id).await;
    tracing::info!(job_id = %job.id, "terminal job consumed and cleaned up");

    response
}
