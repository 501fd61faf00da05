use async_trait::async_trait;
use auditor_core::{AppResult, JobId};
use auditor_domain::JobStatus;
use serde::{Deserialize, Serialize};

/// Result of a worker asking to own a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// The caller owns the running job, either by winning the transition or by
    /// repeating a start it already won.
    Started,
    /// The job had already left pending.
    AlreadyClaimed {
        /// Status observed instead of pending.
        status: JobStatus,
    },
}

/// Port through which workers request job status transitions.
///
/// Workers never write job status directly; the orchestrator owns it.
#[async_trait]
pub trait JobControl: Send + Sync {
    /// Returns current job status.
    async fn job_status(&self, job_id: &JobId) -> AppResult<JobStatus>;

    /// Requests the pending to running transition on behalf of `worker_id`.
    ///
    /// Repeating the request as the owning worker returns `Started` again, so callers
    /// may retry after an ambiguous transport failure.
    async fn start_job(&self, job_id: &JobId, worker_id: &str) -> AppResult<StartOutcome>;

    /// Reports liveness for a running job.
    async fn heartbeat(&self, job_id: &JobId) -> AppResult<()>;

    /// Reports the terminal outcome of a running job.
    async fn complete_job(
        &self,
        job_id: &JobId,
        success: bool,
        error_message: Option<String>,
    ) -> AppResult<()>;
}
