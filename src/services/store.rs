use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

/// Outcome of [`ResultStore::take_terminal`].
#[derive(Debug, PartialEq)]
pub enum TakeOutcome {
    /// The id is not tracked (never submitted, or already consumed).
    Unknown,
    /// The job exists but has not reached a terminal state; it stays in
    /// the store untouched.
    Pending,
    /// The job was terminal; its record has been removed and is handed to
    /// the caller, exactly once.
    Taken(Job),
}

/// Process-wide map from job id to job record.
///
/// Every method takes the lock for the whole operation, so callers never
/// observe a partially updated record. Records enter at `Pending` via
/// ingress, are driven to a terminal state in place by exactly one worker,
/// and leave when retrieval consumes the terminal result.
#[derive(Default)]
pub struct ResultStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_pending(&self, job: Job) {
        debug_assert!(!job.status.is_terminal());
        self.jobs.write().await.insert(job.id, job);
    }

    /// Write a terminal status in place, preserving `created_at` and
    /// stamping `completed_at`. Returns false if the record is gone.
    pub async fn finish(&self, id: Uuid, status: JobStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) => {
                job.status = status;
                job.completed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Consume a terminal record under a single lock acquisition.
    ///
    /// Of two concurrent retrievals for the same terminal id, exactly one
    /// observes `Taken`; the other sees `Unknown`.
    pub async fn take_terminal(&self, id: Uuid) -> TakeOutcome {
        let mut jobs = self.jobs.write().await;
        let terminal = match jobs.get(&id) {
            None => return TakeOutcome::Unknown,
            Some(job) => job.status.is_terminal(),
        };
        if !terminal {
            return TakeOutcome::Pending;
        }
        match jobs.remove(&id) {
            Some(job) => TakeOutcome::Taken(job),
            None => TakeOutcome::Unknown,
        }
    }

    /// Drop a record regardless of state. Used by ingress to roll back a
    /// submission the queue never accepted.
    pub async fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&id)
    }

    /// Snapshot of a record, for inspection.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Number of tracked jobs, terminal or not.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
