use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use step_preview::config::AppConfig;
use step_preview::models::job::{JobStatus, RenderParams};
use step_preview::services::artifacts::ArtifactStore;
use step_preview::services::ingress::{self, SubmitError};
use step_preview::services::invoker::{CommandInvoker, ConvertRequest, ConversionInvoker, InvokeError};
use step_preview::services::queue::{JobQueue, QueueError, QueuedJob};
use step_preview::services::store::{ResultStore, TakeOutcome};
use step_preview::services::sweeper::{self, RetentionPolicy};
use uuid::Uuid;

fn queued(id: Uuid) -> QueuedJob {
    QueuedJob {
        job_id: id,
        input_path: PathBuf::from(format!("/tmp/{id}.stp")),
        output_path: PathBuf::from(format!("/tmp/{id}.png")),
        params: RenderParams {
            width: 1280,
            height: 1024,
            scale: 1,
        },
    }
}

fn test_config(temp_dir: &Path) -> AppConfig {
    AppConfig {
        temp_dir: temp_dir.to_path_buf(),
        enqueue_wait_secs: 0,
        ..AppConfig::default()
    }
}

/// Write an executable shell script standing in for the renderer. The
/// invoker passes `--input <in> --output <out> --width .. --height ..
/// --scale ..`, so `$4` is the output path inside the script.
fn write_fake_renderer(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn queue_preserves_arrival_order() {
    let queue = JobQueue::new(10);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    queue.try_enqueue(queued(first)).await.unwrap();
    queue.try_enqueue(queued(second)).await.unwrap();
    assert_eq!(queue.depth().await, 2);

    let a = queue.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    let b = queue.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(a.job_id, first);
    assert_eq!(b.job_id, second);
}

#[tokio::test]
async fn queue_rejects_pushes_beyond_capacity() {
    let queue = JobQueue::new(2);
    queue.try_enqueue(queued(Uuid::new_v4())).await.unwrap();
    queue.try_enqueue(queued(Uuid::new_v4())).await.unwrap();

    assert!(matches!(
        queue.try_enqueue(queued(Uuid::new_v4())).await,
        Err(QueueError::Full)
    ));
    assert_eq!(queue.depth().await, 2);
}

#[tokio::test]
async fn dequeue_times_out_on_empty_queue() {
    let queue = JobQueue::new(2);
    let start = Instant::now();
    let popped = queue.dequeue_timeout(Duration::from_millis(50)).await;
    assert!(popped.is_none());
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn bounded_enqueue_reports_saturation() {
    let queue = JobQueue::new(1);
    queue.try_enqueue(queued(Uuid::new_v4())).await.unwrap();

    let result = queue
        .enqueue_within(queued(Uuid::new_v4()), Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(QueueError::Saturated { .. })));
    assert_eq!(queue.depth().await, 1);
}

#[tokio::test]
async fn bounded_enqueue_lands_when_a_slot_frees_up() {
    use std::sync::Arc;

    let queue = Arc::new(JobQueue::new(1));
    queue.try_enqueue(queued(Uuid::new_v4())).await.unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .enqueue_within(queued(Uuid::new_v4()), Duration::from_secs(5))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.dequeue_timeout(Duration::from_millis(10)).await.unwrap();

    producer.await.unwrap().unwrap();
    assert_eq!(queue.depth().await, 1);
}

#[tokio::test]
async fn store_lifecycle_consumes_terminal_exactly_once() {
    let store = ResultStore::new();
    let id = Uuid::new_v4();
    let job = step_preview::models::job::Job::pending(
        id,
        PathBuf::from("/tmp/in.stp"),
        PathBuf::from("/tmp/out.png"),
        RenderParams {
            width: 640,
            height: 480,
            scale: 1,
        },
    );
    let created_at = job.created_at;
    store.insert_pending(job).await;

    // Pending jobs are reported but never consumed.
    assert_eq!(store.take_terminal(id).await, TakeOutcome::Pending);
    assert!(store.get(id).await.is_some());

    assert!(
        store
            .finish(
                id,
                JobStatus::Succeeded {
                    output: PathBuf::from("/tmp/out.png"),
                },
            )
            .await
    );

    let taken = match store.take_terminal(id).await {
        TakeOutcome::Taken(job) => job,
        other => panic!("expected terminal job, got {other:?}"),
    };
    assert_eq!(taken.created_at, created_at);
    assert!(taken.completed_at.is_some());
    assert!(taken.status.is_terminal());

    assert_eq!(store.take_terminal(id).await, TakeOutcome::Unknown);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn finish_on_unknown_job_reports_missing_record() {
    let store = ResultStore::new();
    let missing = store
        .finish(
            Uuid::new_v4(),
            JobStatus::Succeeded {
                output: PathBuf::from("/tmp/out.png"),
            },
        )
        .await;
    assert!(!missing);
}

#[tokio::test]
async fn submission_persists_payload_and_registers_job() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let artifacts = ArtifactStore::new(dir.path());
    let store = ResultStore::new();
    let queue = JobQueue::new(10);

    let id = ingress::submit(
        b"ISO-10303-21;\nHEADER;",
        &Default::default(),
        &config,
        &artifacts,
        &store,
        &queue,
    )
    .await
    .unwrap();

    let saved = std::fs::read(artifacts.input_path(id)).unwrap();
    assert_eq!(saved, b"ISO-10303-21;\nHEADER;");
    assert_eq!(queue.depth().await, 1);
    assert_eq!(store.take_terminal(id).await, TakeOutcome::Pending);
}

#[tokio::test]
async fn rejected_signature_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let artifacts = ArtifactStore::new(dir.path());
    let store = ResultStore::new();
    let queue = JobQueue::new(10);

    let result = ingress::submit(
        b"\x89PNG not a step file",
        &Default::default(),
        &config,
        &artifacts,
        &store,
        &queue,
    )
    .await;

    assert!(matches!(result, Err(SubmitError::BadSignature)));
    assert!(store.is_empty().await);
    assert_eq!(queue.depth().await, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn saturated_queue_rolls_back_the_submission() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let artifacts = ArtifactStore::new(dir.path());
    let store = ResultStore::new();
    let queue = JobQueue::new(1);

    // Fill the queue; nothing drains it.
    ingress::submit(
        b"ISO-10303-21;first",
        &Default::default(),
        &config,
        &artifacts,
        &store,
        &queue,
    )
    .await
    .unwrap();

    let result = ingress::submit(
        b"ISO-10303-21;second",
        &Default::default(),
        &config,
        &artifacts,
        &store,
        &queue,
    )
    .await;

    assert!(matches!(result, Err(SubmitError::QueueSaturated { .. })));
    assert_eq!(queue.depth().await, 1);
    assert_eq!(store.len().await, 1);
    // Only the accepted job's input remains on disk.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn sweeper_removes_only_stale_tracked_files() {
    let dir = tempfile::tempdir().unwrap();
    let stale_input = dir.path().join("a.stp");
    let stale_output = dir.path().join("b.png");
    let foreign = dir.path().join("keep.txt");
    std::fs::write(&stale_input, b"step").unwrap();
    std::fs::write(&stale_output, b"png").unwrap();
    std::fs::write(&foreign, b"other").unwrap();

    // Zero max age: every tracked file counts as stale.
    let policy = RetentionPolicy::new(Duration::from_secs(600), Duration::ZERO);
    let removed = sweeper::sweep_once(dir.path(), &policy).await.unwrap();

    assert_eq!(removed, 2);
    assert!(!stale_input.exists());
    assert!(!stale_output.exists());
    assert!(foreign.exists());
}

#[tokio::test]
async fn sweeper_keeps_fresh_files() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("fresh.png");
    std::fs::write(&fresh, b"png").unwrap();

    let policy = RetentionPolicy::new(Duration::from_secs(600), Duration::from_secs(3600));
    let removed = sweeper::sweep_once(dir.path(), &policy).await.unwrap();

    assert_eq!(removed, 0);
    assert!(fresh.exists());
}

#[tokio::test]
async fn command_invoker_runs_the_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_fake_renderer(dir.path(), "ok.sh", r#"printf 'PNGDATA' > "$4""#);

    let output = dir.path().join("out.png");
    let invoker = CommandInvoker::new(&program, Duration::from_secs(5));
    let req = ConvertRequest {
        input: dir.path().join("in.stp"),
        output: output.clone(),
        params: RenderParams {
            width: 320,
            height: 240,
            scale: 1,
        },
    };

    invoker.convert(&req).await.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"PNGDATA");
}

#[tokio::test]
async fn command_invoker_reports_renderer_failures() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_fake_renderer(dir.path(), "fail.sh", "echo boom >&2\nexit 3");

    let invoker = CommandInvoker::new(&program, Duration::from_secs(5));
    let req = ConvertRequest {
        input: dir.path().join("in.stp"),
        output: dir.path().join("out.png"),
        params: RenderParams {
            width: 320,
            height: 240,
            scale: 1,
        },
    };

    match invoker.convert(&req).await {
        Err(InvokeError::Renderer { code, stderr }) => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected renderer failure, got {other:?}"),
    }
}

#[tokio::test]
async fn command_invoker_kills_a_hung_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let program = write_fake_renderer(dir.path(), "hang.sh", "sleep 30");

    let output = dir.path().join("out.png");
    let invoker = CommandInvoker::new(&program, Duration::from_millis(300));
    let req = ConvertRequest {
        input: dir.path().join("in.stp"),
        output: output.clone(),
        params: RenderParams {
            width: 320,
            height: 240,
            scale: 1,
        },
    };

    let start = Instant::now();
    let result = invoker.convert(&req).await;

    assert!(matches!(result, Err(InvokeError::Timeout { .. })));
    // The child was killed and reaped well before its own 30 s sleep.
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!output.exists());
}

#[tokio::test]
async fn command_invoker_reports_missing_program() {
    let invoker = CommandInvoker::new("/nonexistent/renderer", Duration::from_secs(1));
    let req = ConvertRequest {
        input: PathBuf::from("/tmp/in.stp"),
        output: PathBuf::from("/tmp/out.png"),
        params: RenderParams {
            width: 320,
            height: 240,
            scale: 1,
        },
    };

    assert!(matches!(
        invoker.convert(&req).await,
        Err(InvokeError::Spawn(_))
    ));
}
