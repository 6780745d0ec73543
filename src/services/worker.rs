use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::job::{FailureKind, JobFailure, JobStatus};
use crate::services::invoker::{ConvertRequest, ConversionInvoker, InvokeError};
use crate::services::queue::{JobQueue, QueuedJob};
use crate::services::store::ResultStore;

/// How long a worker parks on an empty queue before re-checking.
const DEQUEUE_WAIT: Duration = Duration::from_secs(1);

/// Spawn the fixed pool of long-lived conversion workers.
///
/// Workers are started once at process startup and never exit in normal
/// operation. Each drains the queue, invokes the renderer, and writes the
/// terminal result into the store.
pub fn spawn_workers(
    count: usize,
    queue: Arc<JobQueue>,
    store: Arc<ResultStore>,
    invoker: Arc<dyn ConversionInvoker>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let queue = Arc::clone(&queue);
            let store = Arc::clone(&store);
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move {
                tracing::debug!(worker_id, "conversion worker started");
                loop {
                    let Some(job) = queue.dequeue_timeout(DEQUEUE_WAIT).await else {
                        continue;
                    };
                    metrics::gauge!("convert_queue_depth").set(queue.depth().await as f64);
                    process_job(&job, &store, invoker.as_ref()).await;
                }
            })
        })
        .collect()
}

/// Run one dequeued job to its terminal state.
///
/// The caller owns the job exclusively after the pop, so the terminal write
/// is the only mutation this record will ever see from a worker. A single
/// attempt is made; there is no retry.
pub async fn process_job(
    job: &QueuedJob,
    store: &ResultStore,
    invoker: &dyn ConversionInvoker,
) {
    tracing::info!(job_id = %job.job_id, "processing conversion job");
    let start = std::time::Instant::now();

    let req = ConvertRequest {
        input: job.input_path.clone(),
        output: job.output_path.clone(),
        params: job.params,
    };

    let status = match invoker.convert(&req).await {
        Ok(()) => verify_output(job).await,
        Err(e) => {
            let kind = match e {
                InvokeError::Timeout { .. } => FailureKind::Timeout,
                _ => FailureKind::Runtime,
            };
            JobStatus::Failed {
                reason: JobFailure {
                    kind,
                    message: e.to_string(),
                },
            }
        }
    };

    let elapsed = start.elapsed();
    metrics::histogram!("convert_processing_seconds").record(elapsed.as_secs_f64());

    match &status {
        JobStatus::Succeeded { .. } => {
            metrics::counter!("convert_jobs_completed").increment(1);
            tracing::info!(
                job_id = %job.job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "conversion succeeded"
            );
        }
        JobStatus::Failed { reason } => {
            metrics::counter!("convert_jobs_failed").increment(1);
            tracing::warn!(
                job_id = %job.job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                kind = ?reason.kind,
                error = %reason.message,
                "conversion failed"
            );
        }
        JobStatus::Pending => {}
    }

    if !store.finish(job.job_id, status).await {
        tracing::warn!(job_id = %job.job_id, "finished job is no longer tracked");
    }
}

/// A clean exit only counts as success when the output file exists and is
/// non-empty.
async fn verify_output(job: &QueuedJob) -> JobStatus {
    match tokio::fs::metadata(&job.output_path).await {
        Ok(meta) if meta.len() > 0 => JobStatus::Succeeded {
            output: job.output_path.clone(),
        },
        _ => JobStatus::Failed {
            reason: JobFailure {
                kind: FailureKind::Runtime,
                message: "renderer exited cleanly but produced no output".to_string(),
            },
        },
    }
}
