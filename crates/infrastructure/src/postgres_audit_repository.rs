use async_trait::async_trait;
use auditor_application::{
    AuditFindingRepository, AuditJobRepository, AuditJobStats, FindingListQuery,
    FindingSeverityCounts, FindingWrite, JobOutcome,
};
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{
    AccountTarget, AuditFinding, AuditJob, AuditJobRecord, CheckName, CloudProvider, JobPriority,
    JobStatus, NewAuditFinding, Severity,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

mod findings;
mod jobs;

/// PostgreSQL-backed result store for audit jobs and findings.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditJobRow {
    job_id: String,
    cloud_provider: String,
    subscription_id: Option<String>,
    account_id: Option<String>,
    project_id: Option<String>,
    status: String,
    checks: Vec<String>,
    priority: String,
    credentials_ref: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    worker_id: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, FromRow)]
struct AuditFindingRow {
    id: i64,
    job_id: String,
    resource_id: String,
    resource_type: String,
    check_type: String,
    severity: String,
    description: String,
    recommendation: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

#[async_trait]
impl AuditJobRepository for PostgresAuditRepository {
    async fn insert_job(&self, job: &AuditJob) -> AppResult<()> {
        self.insert_job_impl(job).await
    }

    async fn delete_pending_job(&self, job_id: &JobId) -> AppResult<()> {
        self.delete_pending_job_impl(job_id).await
    }

    async fn find_job(&self, job_id: &JobId) -> AppResult<Option<AuditJob>> {
        self.find_job_impl(job_id).await
    }

    async fn transition_to_running(
        &self,
        job_id: &JobId,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        self.transition_to_running_impl(job_id, worker_id, at).await
    }

    async fn record_heartbeat(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        self.record_heartbeat_impl(job_id, at).await
    }

    async fn finish_job(
        &self,
        job_id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        self.finish_job_impl(job_id, outcome, at).await
    }

    async fn fail_stalled_jobs(
        &self,
        stalled_before: DateTime<Utc>,
        at: DateTime<Utc>,
        error_message: &str,
    ) -> AppResult<Vec<AuditJob>> {
        self.fail_stalled_jobs_impl(stalled_before, at, error_message)
            .await
    }

    async fn job_stats(&self) -> AppResult<AuditJobStats> {
        self.job_stats_impl().await
    }
}

#[async_trait]
impl AuditFindingRepository for PostgresAuditRepository {
    async fn append_finding(&self, finding: NewAuditFinding) -> AppResult<FindingWrite> {
        self.append_finding_impl(finding).await
    }

    async fn list_findings(&self, query: &FindingListQuery) -> AppResult<Vec<AuditFinding>> {
        self.list_findings_impl(query).await
    }

    async fn count_findings(&self, job_id: &JobId) -> AppResult<i64> {
        self.count_findings_impl(job_id).await
    }

    async fn severity_counts(&self) -> AppResult<FindingSeverityCounts> {
        self.severity_counts_impl().await
    }
}

fn audit_job_from_row(row: AuditJobRow) -> AppResult<AuditJob> {
    let provider = CloudProvider::parse(row.cloud_provider.as_str()).map_err(|error| {
        AppError::Internal(format!(
            "invalid cloud_provider stored for audit job '{}': {error}",
            row.job_id
        ))
    })?;
    let target = AccountTarget::from_parts(
        provider,
        row.subscription_id,
        row.account_id,
        row.project_id,
    )
    .map_err(|error| {
        AppError::Internal(format!(
            "invalid account target stored for audit job '{}': {error}",
            row.job_id
        ))
    })?;
    let checks = row
        .checks
        .into_iter()
        .map(CheckName::new)
        .collect::<AppResult<Vec<_>>>()
        .map_err(|error| {
            AppError::Internal(format!(
                "invalid checks stored for audit job '{}': {error}",
                row.job_id
            ))
        })?;
    let status = JobStatus::parse(row.status.as_str())
        .map_err(|error| AppError::Internal(format!("invalid stored job status: {error}")))?;
    let priority = JobPriority::parse(row.priority.as_str())
        .map_err(|error| AppError::Internal(format!("invalid stored job priority: {error}")))?;
    let job_id = JobId::new(row.job_id)
        .map_err(|error| AppError::Internal(format!("invalid stored job id: {error}")))?;

    AuditJob::restore(AuditJobRecord {
        job_id,
        target,
        checks,
        priority,
        credentials_ref: row.credentials_ref,
        status,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        last_heartbeat_at: row.last_heartbeat_at,
        worker_id: row.worker_id,
        error_message: row.error_message,
    })
}

fn audit_finding_from_row(row: AuditFindingRow) -> AppResult<AuditFinding> {
    let job_id = JobId::new(row.job_id)
        .map_err(|error| AppError::Internal(format!("invalid stored finding job id: {error}")))?;
    let check_type = CheckName::new(row.check_type)
        .map_err(|error| AppError::Internal(format!("invalid stored finding check: {error}")))?;
    let severity = Severity::parse(row.severity.as_str())
        .map_err(|error| AppError::Internal(format!("invalid stored finding severity: {error}")))?;

    Ok(AuditFinding {
        id: row.id,
        job_id,
        resource_id: row.resource_id,
        resource_type: row.resource_type,
        check_type,
        severity,
        description: row.description,
        recommendation: row.recommendation,
        metadata: row.metadata,
        created_at: row.created_at,
    })
}
