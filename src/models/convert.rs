use serde::{Deserialize, Serialize};

use crate::models::job::FailureKind;

/// Raw query parameters on POST /convert. Values arrive as strings and are
/// validated by the ingress layer.
#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    pub width: Option<String>,
    pub height: Option<String>,
    pub scale: Option<String>,
}

/// Query parameters on GET /convert.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub item_id: Option<String>,
}

/// Response after a submission has been accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertAccepted {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

/// Response for a job that has not reached a terminal state yet.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertPending {
    pub job_id: String,
    pub status: String,
}

/// Response carrying the finished image, base64-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResult {
    pub job_id: String,
    pub status: String,
    pub image: String,
}

/// Response for a job that reached a terminal failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertFailed {
    pub job_id: String,
    pub status: String,
    pub kind: FailureKind,
    pub error: String,
}

/// Generic error body for rejected requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
