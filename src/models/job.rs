use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Render dimensions resolved from query parameters and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

/// Why a conversion job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Status of a conversion job. `Pending` is the only non-terminal state;
/// a job is mutated exactly once to reach `Succeeded` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    Pending,
    Succeeded { output: PathBuf },
    Failed { reason: JobFailure },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// A STEP-to-PNG conversion job tracked from submission through retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub params: RenderParams,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn pending(
        id: Uuid,
        input_path: PathBuf,
        output_path: PathBuf,
        params: RenderParams,
    ) -> Self {
        Self {
            id,
            input_path,
            output_path,
            params,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
