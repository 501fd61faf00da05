use async_trait::async_trait;
use auditor_core::{AppResult, JobId};
use auditor_domain::{AuditJob, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status change notification for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusEvent {
    /// Job identifier.
    pub job_id: JobId,
    /// Status after the transition.
    pub status: JobStatus,
    /// Failure reason when failed.
    pub error_message: Option<String>,
    /// Transition time.
    pub occurred_at: DateTime<Utc>,
}

impl JobStatusEvent {
    /// Builds the event describing the current state of a job.
    #[must_use]
    pub fn from_job(job: &AuditJob) -> Self {
        let occurred_at = job
            .completed_at()
            .or(job.started_at())
            .unwrap_or_else(|| job.created_at());

        Self {
            job_id: job.job_id().clone(),
            status: job.status(),
            error_message: job.error_message().map(ToOwned::to_owned),
            occurred_at,
        }
    }
}

/// Optional publish/subscribe port for status changes.
///
/// The result store stays the source of truth; publishing is best effort.
#[async_trait]
pub trait JobStatusEventPublisher: Send + Sync {
    /// Publishes one status change.
    async fn publish(&self, event: &JobStatusEvent) -> AppResult<()>;
}
