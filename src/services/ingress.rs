use std::borrow::Cow;

use base64::Engine;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::convert::RenderQuery;
use crate::models::job::{Job, RenderParams};
use crate::services::artifacts::ArtifactStore;
use crate::services::queue::{JobQueue, QueueError, QueuedJob};
use crate::services::store::ResultStore;

/// Magic prefix every STEP file starts with.
pub const STEP_MAGIC: &[u8] = b"ISO-10303-21;";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("payload does not carry a STEP signature")]
    BadSignature,

    #[error("invalid value for {name}: {value:?}")]
    BadParameters { name: &'static str, value: String },

    #[error("conversion queue stayed full for {waited_ms} ms")]
    QueueSaturated { waited_ms: u64 },

    #[error("failed to persist upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Check the payload signature, accepting either a raw STEP file or a
/// base64-encoded one. Returns the bytes to persist, decoded when the
/// base64 reinterpretation is what matched.
pub fn check_signature(payload: &[u8]) -> Result<Cow<'_, [u8]>, SubmitError> {
    if payload.starts_with(STEP_MAGIC) {
        return Ok(Cow::Borrowed(payload));
    }
    if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(payload) {
        if decoded.starts_with(STEP_MAGIC) {
            return Ok(Cow::Owned(decoded));
        }
    }
    Err(SubmitError::BadSignature)
}

/// Resolve width/height/scale from query strings, falling back to the
/// configured defaults when absent.
pub fn resolve_params(query: &RenderQuery, config: &AppConfig) -> Result<RenderParams, SubmitError> {
    Ok(RenderParams {
        width: parse_dim("width", query.width.as_deref(), config.default_width)?,
        height: parse_dim("height", query.height.as_deref(), config.default_height)?,
        scale: parse_dim("scale", query.scale.as_deref(), config.default_scale)?,
    })
}

fn parse_dim(name: &'static str, raw: Option<&str>, default: u32) -> Result<u32, SubmitError> {
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|_| SubmitError::BadParameters {
            name,
            value: s.to_string(),
        }),
    }
}

/// Accept one submission: validate, persist the payload, register the
/// pending job, and enqueue it under bounded backpressure.
///
/// Returns the job id without waiting for the conversion. If the queue
/// stays full past the configured deadline the whole submission is rolled
/// back (record and input file removed) so a rejected upload leaves no
/// trace.
pub async fn submit(
    payload: &[u8],
    query: &RenderQuery,
    config: &AppConfig,
    artifacts: &ArtifactStore,
    store: &ResultStore,
    queue: &JobQueue,
) -> Result<Uuid, SubmitError> {
    let payload = check_signature(payload)?;
    let params = resolve_params(query, config)?;

    let id = Uuid::new_v4();
    let input_path = artifacts.save_input(id, &payload).await?;
    let output_path = artifacts.output_path(id);

    store
        .insert_pending(Job::pending(id, input_path.clone(), output_path.clone(), params))
        .await;

    let queued = QueuedJob {
        job_id: id,
        input_path,
        output_path,
        params,
    };

    match queue.enqueue_within(queued, config.enqueue_wait()).await {
        Ok(()) => {
            tracing::info!(
                job_id = %id,
                width = params.width,
                height = params.height,
                scale = params.scale,
                "conversion job accepted"
            );
            Ok(id)
        }
        Err(e) => {
            let waited_ms = match e {
                QueueError::Saturated { waited_ms } => waited_ms,
                QueueError::Full => 0,
            };
            store.remove(id).await;
            artifacts.remove_artifacts(id).await;
            tracing::warn!(job_id = %id, waited_ms, "queue saturated, submission rejected");
            Err(SubmitError::QueueSaturated { waited_ms })
        }
    }
}
