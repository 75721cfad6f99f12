//! Export job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job state machine: `queued → running → (succeeded | failed | canceled)`.
/// Terminal states are immutable except via retention GC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Why an enqueue or cancel was refused with `409 CONFLICT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    IdempotencyBodyMismatch,
    DuplicateJob,
    NotCancelable,
}

impl ConflictReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::IdempotencyBodyMismatch => "idempotency key already used with different payload",
            Self::DuplicateJob => "duplicate request exists for the same criteria",
            Self::NotCancelable => "job is not cancelable in current state",
        }
    }
}

/// Archive export criteria as submitted by the client. Dates are inclusive
/// UTC days in `YYYY-MM-DD` form; parsing happens in validation so field
/// errors stay addressable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub format: String,
}

/// Successful outcome: a short-lived signed URL onto the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
    pub size: usize,
}

/// Terminal error attached to a failed or canceled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corr_id: Option<String>,
}

impl JobError {
    pub fn canceled() -> Self {
        Self {
            code: "canceled".to_string(),
            message: "canceled by user".to_string(),
            retryable: true,
            corr_id: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "internal-error".to_string(),
            message: message.into(),
            retryable: true,
            corr_id: None,
        }
    }
}

/// An export job as surfaced to clients and tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// 0..100, monotonic
    pub progress: u8,
    pub criteria_hash: String,
    pub retry_count: u32,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub can_cancel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExportResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl ExportJob {
    pub fn queued(criteria_hash: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress: 0,
            criteria_hash: criteria_hash.into(),
            retry_count: 0,
            requested_at: Utc::now(),
            started_at: None,
            finished_at: None,
            can_cancel: false,
            result: None,
            error: None,
        }
    }
}

/// Guidance returned with `413 REQUEST_TOO_LARGE` when a date range exceeds
/// the maximum: how many submissions to split into and their estimated size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitHint {
    pub chunks: u64,
    #[serde(rename = "approxSizeMB")]
    pub approx_size_mb: u64,
}

/// A single addressable validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}
