use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{AuditFinding, AuditJob, NewAuditFinding, Severity};
use chrono::{DateTime, Utc};

/// Terminal outcome requested by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every check executed.
    Completed,
    /// The job could not finish.
    Failed {
        /// Failure reason stored on the job.
        error_message: String,
    },
}

/// Aggregated job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditJobStats {
    /// Jobs waiting for a worker.
    pub pending_jobs: i64,
    /// Jobs owned by a worker.
    pub running_jobs: i64,
    /// Jobs that finished.
    pub completed_jobs: i64,
    /// Jobs that failed or timed out.
    pub failed_jobs: i64,
}

impl AuditJobStats {
    /// Returns total number of jobs.
    #[must_use]
    pub fn total_jobs(&self) -> i64 {
        self.pending_jobs + self.running_jobs + self.completed_jobs + self.failed_jobs
    }
}

/// Aggregated finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingSeverityCounts {
    /// Informational findings.
    pub info: i64,
    /// Low severity findings.
    pub low: i64,
    /// Medium severity findings.
    pub medium: i64,
    /// High severity findings.
    pub high: i64,
    /// Critical severity findings.
    pub critical: i64,
}

impl FindingSeverityCounts {
    /// Adds `count` findings of one severity.
    pub fn add(&mut self, severity: Severity, count: i64) {
        match severity {
            Severity::Info => self.info += count,
            Severity::Low => self.low += count,
            Severity::Medium => self.medium += count,
            Severity::High => self.high += count,
            Severity::Critical => self.critical += count,
        }
    }

    /// Returns total number of findings.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.info + self.low + self.medium + self.high + self.critical
    }
}

/// Result of an idempotent finding append.
#[derive(Debug, Clone, PartialEq)]
pub enum FindingWrite {
    /// The finding was stored.
    Inserted(AuditFinding),
    /// A finding for the same `(job_id, resource_id, check_type)` already exists.
    Duplicate,
}

/// Position in the `(created_at, id)` finding order.
///
/// Encoded as `<created_at micros>.<id>` so clients can treat it as an opaque token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FindingCursor {
    /// Creation timestamp of the last finding seen.
    pub created_at: DateTime<Utc>,
    /// Identifier of the last finding seen.
    pub id: i64,
}

impl FindingCursor {
    /// Returns the cursor positioned at one finding.
    #[must_use]
    pub fn after(finding: &AuditFinding) -> Self {
        Self {
            created_at: finding.created_at,
            id: finding.id,
        }
    }

    /// Parses an encoded cursor token.
    pub fn parse(value: &str) -> AppResult<Self> {
        let invalid = || AppError::Validation(format!("invalid findings cursor '{value}'"));

        let (micros, id) = value.split_once('.').ok_or_else(invalid)?;
        let micros = micros.parse::<i64>().map_err(|_| invalid())?;
        let id = id.parse::<i64>().map_err(|_| invalid())?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(invalid)?;

        Ok(Self { created_at, id })
    }
}

impl Display for FindingCursor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}.{}", self.created_at.timestamp_micros(), self.id)
    }
}

/// Finding listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingListQuery {
    /// Owning job.
    pub job_id: JobId,
    /// Optional exact severity filter.
    pub severity: Option<Severity>,
    /// Only return findings strictly after this position.
    pub after: Option<FindingCursor>,
    /// Page size.
    pub limit: usize,
}

/// One page of findings ordered by `created_at` ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingPage {
    /// Findings in this page.
    pub findings: Vec<AuditFinding>,
    /// Cursor to resume after this page, absent on the last page.
    pub next_cursor: Option<FindingCursor>,
}

/// Repository port for audit job rows.
///
/// Every transition is a conditional update: it only applies when the stored status
/// matches the expected prior status, and returns `None` otherwise.
#[async_trait]
pub trait AuditJobRepository: Send + Sync {
    /// Inserts a new pending job, `Conflict` when the identifier exists.
    async fn insert_job(&self, job: &AuditJob) -> AppResult<()>;

    /// Deletes a job that is still pending; used to roll back failed dispatch.
    async fn delete_pending_job(&self, job_id: &JobId) -> AppResult<()>;

    /// Returns one job by identifier.
    async fn find_job(&self, job_id: &JobId) -> AppResult<Option<AuditJob>>;

    /// Moves a pending job to running and records the owning worker.
    async fn transition_to_running(
        &self,
        job_id: &JobId,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>>;

    /// Refreshes the liveness timestamp of a running job.
    async fn record_heartbeat(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>>;

    /// Moves a running job to a terminal status.
    async fn finish_job(
        &self,
        job_id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>>;

    /// Fails every running job whose last liveness signal is older than `stalled_before`.
    async fn fail_stalled_jobs(
        &self,
        stalled_before: DateTime<Utc>,
        at: DateTime<Utc>,
        error_message: &str,
    ) -> AppResult<Vec<AuditJob>>;

    /// Returns job counts per status.
    async fn job_stats(&self) -> AppResult<AuditJobStats>;
}

/// Repository port for append-only findings.
#[async_trait]
pub trait AuditFindingRepository: Send + Sync {
    /// Appends one finding unless the same `(job_id, resource_id, check_type)` exists.
    async fn append_finding(&self, finding: NewAuditFinding) -> AppResult<FindingWrite>;

    /// Lists findings ordered by `(created_at, id)` ascending.
    async fn list_findings(&self, query: &FindingListQuery) -> AppResult<Vec<AuditFinding>>;

    /// Counts findings recorded for one job.
    async fn count_findings(&self, job_id: &JobId) -> AppResult<i64>;

    /// Returns finding counts per severity across all jobs.
    async fn severity_counts(&self) -> AppResult<FindingSeverityCounts>;
}
