//! Shared vocabulary for import jobs: status and item-error kinds.
//!
//! These enums are persisted as lowercase strings and exposed verbatim on
//! the API, so the string forms here are a stable contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of an import job.
///
/// Transitions only move forward (`pending → processing → completed|failed`)
/// except `stopped`, which is reachable from `pending` or `processing` via
/// cooperative cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    /// `true` for statuses that accept no further item processing.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown job status: {0:?}")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "stopped" => Ok(JobStatus::Stopped),
            other => Err(UnknownJobStatus(other.to_owned())),
        }
    }
}

/// Per-item outcome recorded after every processed identifier. Exactly one
/// of the `succeeded`/`failed`/`skipped` counters advances per item,
/// together with `processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Classification for a recorded item-level (or job-level) error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// Malformed identifier/URL, rejected before the job exists.
    Input,
    /// The enrichment response carried no record for the identifier.
    EnrichmentMiss,
    /// A required field was missing or invalid on the enriched record.
    Validation,
    /// Upstream rate limiting persisted through the bounded retries.
    RateLimited,
    /// Job-scoped fault (catalog unreachable etc.); aborts the job.
    System,
    /// Marker row appended when a job is cooperatively stopped.
    Cancelled,
}

impl ItemErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemErrorKind::Input => "input",
            ItemErrorKind::EnrichmentMiss => "enrichment_miss",
            ItemErrorKind::Validation => "validation",
            ItemErrorKind::RateLimited => "rate_limited",
            ItemErrorKind::System => "system",
            ItemErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown item error kind: {0:?}")]
pub struct UnknownItemErrorKind(pub String);

impl FromStr for ItemErrorKind {
    type Err = UnknownItemErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(ItemErrorKind::Input),
            "enrichment_miss" => Ok(ItemErrorKind::EnrichmentMiss),
            "validation" => Ok(ItemErrorKind::Validation),
            "rate_limited" => Ok(ItemErrorKind::RateLimited),
            "system" => Ok(ItemErrorKind::System),
            "cancelled" => Ok(ItemErrorKind::Cancelled),
            other => Err(UnknownItemErrorKind(other.to_owned())),
        }
    }
}
