use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

/// Extension of uploaded CAD inputs.
pub const INPUT_EXT: &str = "stp";

/// Extension of rendered outputs.
pub const OUTPUT_EXT: &str = "png";

/// Per-job artifact layout under the temp root.
///
/// Paths are derived purely from the job id, so ingress, workers, retrieval
/// and the sweeper all resolve the same files without coordination.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn input_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", id.simple(), INPUT_EXT))
    }

    pub fn output_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", id.simple(), OUTPUT_EXT))
    }

    /// Persist an uploaded payload as the job's input artifact.
    pub async fn save_input(&self, id: Uuid, payload: &[u8]) -> io::Result<PathBuf> {
        let path = self.input_path(id);
        fs::write(&path, payload).await?;
        Ok(path)
    }

    /// Read the rendered output artifact.
    pub async fn read_output(&self, id: Uuid) -> io::Result<Vec<u8>> {
        fs::read(self.output_path(id)).await
    }

    /// Delete both artifacts of a job. Already-gone files are fine: the
    /// sweeper or a concurrent retrieval may have raced us to the unlink.
    pub async fn remove_artifacts(&self, id: Uuid) {
        remove_quiet(&self.input_path(id)).await;
        remove_quiet(&self.output_path(id)).await;
    }
}

async fn remove_quiet(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
        }
    }
}
