use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::models::job::RenderParams;

/// Maximum stderr captured from the renderer (64 KiB).
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// One render request handed to the invoker.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: RenderParams,
}

/// Boundary to the external rendering program.
///
/// The worker only depends on this trait, so tests substitute stubs and the
/// production implementation stays free to fork whatever renderer is
/// configured.
#[async_trait]
pub trait ConversionInvoker: Send + Sync {
    async fn convert(&self, req: &ConvertRequest) -> Result<(), InvokeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to launch renderer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("renderer exited with status {code}: {stderr}")]
    Renderer { code: i32, stderr: String },

    #[error("renderer timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
}

/// Invoker that runs the configured renderer as an isolated child process:
///
/// ```text
/// <program> --input <in.stp> --output <out.png> --width W --height H --scale S
/// ```
///
/// The child runs under a wall-clock timeout; on expiry it is killed and
/// reaped before the error is reported, so no renderer outlives its job.
pub struct CommandInvoker {
    program: PathBuf,
    timeout: Duration,
}

impl CommandInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConversionInvoker for CommandInvoker {
    async fn convert(&self, req: &ConvertRequest) -> Result<(), InvokeError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--input")
            .arg(&req.input)
            .arg("--output")
            .arg(&req.output)
            .arg("--width")
            .arg(req.params.width.to_string())
            .arg("--height")
            .arg(req.params.height.to_string())
            .arg("--scale")
            .arg(req.params.scale.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(InvokeError::Spawn)?;

        // Drain stderr concurrently so a chatty renderer cannot block on a
        // full pipe while we wait on it.
        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => {
                let stderr = stderr_task.await.unwrap_or_default();
                Err(InvokeError::Renderer {
                    code: status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
                })
            }
            Ok(Err(e)) => Err(InvokeError::Spawn(e)),
            Err(_elapsed) => {
                // Kill and reap so the child does not linger as a zombie.
                let _ = child.start_kill();
                let _ = child.wait().await;
                stderr_task.abort();
                Err(InvokeError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}
