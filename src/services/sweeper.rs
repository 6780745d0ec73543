use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::artifacts::{INPUT_EXT, OUTPUT_EXT};

/// What the retention sweeper removes, and how often it looks.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Period between sweeps.
    pub interval: Duration,
    /// Files whose mtime is older than this are removed.
    pub max_age: Duration,
    /// Extensions of tracked artifacts.
    pub extensions: Vec<String>,
}

impl RetentionPolicy {
    pub fn new(interval: Duration, max_age: Duration) -> Self {
        Self {
            interval,
            max_age,
            extensions: vec![INPUT_EXT.to_string(), OUTPUT_EXT.to_string()],
        }
    }
}

/// Start the periodic retention sweep for the process lifetime.
///
/// The sweeper is a safety net for jobs the client abandoned: retrieval
/// never ran for them, so their artifacts outlive their store records. It
/// works purely on the filesystem and needs no job bookkeeping.
pub fn spawn_sweeper(root: PathBuf, policy: RetentionPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(policy.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            match sweep_once(&root, &policy).await {
                Ok(0) => tracing::debug!("retention sweep: nothing stale"),
                Ok(removed) => tracing::info!(removed, "retention sweep removed stale artifacts"),
                Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}

/// One pass over the temp root: unlink tracked files older than the policy
/// allows. Exposed separately so tests can drive a sweep directly.
pub async fn sweep_once(root: &Path, policy: &RetentionPolicy) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let tracked = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| policy.extensions.iter().any(|t| t == ext))
            .unwrap_or(false);
        if !tracked {
            continue;
        }

        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };

        let age = now.duration_since(modified).unwrap_or_default();
        if age < policy.max_age {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = %path.display(), "removed stale artifact");
            }
            // Retrieval may have consumed the job mid-sweep.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove stale artifact");
            }
        }
    }

    Ok(removed)
}
