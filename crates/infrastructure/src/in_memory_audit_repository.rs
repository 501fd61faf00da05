use std::collections::HashMap;

use async_trait::async_trait;
use auditor_application::{
    AuditFindingRepository, AuditJobRepository, AuditJobStats, FindingCursor, FindingListQuery,
    FindingSeverityCounts, FindingWrite, JobOutcome,
};
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{AuditFinding, AuditJob, JobStatus, NewAuditFinding};
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;

/// In-memory audit job and finding store for single-process deployments and tests.
///
/// Timestamps are truncated to microseconds so cursors behave like the PostgreSQL store.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    jobs: RwLock<HashMap<JobId, AuditJob>>,
    findings: RwLock<FindingLog>,
}

#[derive(Debug, Default)]
struct FindingLog {
    entries: Vec<AuditFinding>,
    last_id: i64,
    last_created_at: Option<DateTime<Utc>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_job(
        &self,
        job_id: &JobId,
        expected: JobStatus,
        apply: impl FnOnce(&mut AuditJob) -> AppResult<()>,
    ) -> AppResult<Option<AuditJob>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(job_id) else {
            return Ok(None);
        };
        if job.status() != expected {
            return Ok(None);
        }

        let mut updated = job.clone();
        apply(&mut updated)?;
        *job = updated.clone();

        Ok(Some(updated))
    }
}

#[async_trait]
impl AuditJobRepository for InMemoryAuditRepository {
    async fn insert_job(&self, job: &AuditJob) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.job_id()) {
            return Err(AppError::Conflict(format!(
                "audit job '{}' already exists",
                job.job_id()
            )));
        }

        jobs.insert(job.job_id().clone(), job.clone());
        Ok(())
    }

    async fn delete_pending_job(&self, job_id: &JobId) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs
            .get(job_id)
            .is_some_and(|job| job.status() == JobStatus::Pending)
        {
            jobs.remove(job_id);
        }

        Ok(())
    }

    async fn find_job(&self, job_id: &JobId) -> AppResult<Option<AuditJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn transition_to_running(
        &self,
        job_id: &JobId,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let at = at.trunc_subsecs(6);
        self.update_job(job_id, JobStatus::Pending, |job| job.start(at, worker_id))
            .await
    }

    async fn record_heartbeat(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let at = at.trunc_subsecs(6);
        self.update_job(job_id, JobStatus::Running, |job| {
            let latest = job.last_heartbeat_at().map_or(at, |previous| previous.max(at));
            job.record_heartbeat(latest)
        })
        .await
    }

    async fn finish_job(
        &self,
        job_id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let at = at.trunc_subsecs(6);
        self.update_job(job_id, JobStatus::Running, |job| match outcome {
            JobOutcome::Completed => job.complete(at),
            JobOutcome::Failed { error_message } => job.fail(at, error_message),
        })
        .await
    }

    async fn fail_stalled_jobs(
        &self,
        stalled_before: DateTime<Utc>,
        at: DateTime<Utc>,
        error_message: &str,
    ) -> AppResult<Vec<AuditJob>> {
        let at = at.trunc_subsecs(6);
        let mut jobs = self.jobs.write().await;
        let mut reaped = Vec::new();

        for job in jobs.values_mut() {
            let stalled = job.status() == JobStatus::Running
                && job
                    .last_liveness_at()
                    .is_some_and(|liveness| liveness < stalled_before);
            if !stalled {
                continue;
            }

            job.fail(at, error_message)?;
            reaped.push(job.clone());
        }

        reaped.sort_by(|left, right| left.job_id().cmp(right.job_id()));
        Ok(reaped)
    }

    async fn job_stats(&self) -> AppResult<AuditJobStats> {
        let jobs = self.jobs.read().await;
        let mut stats = AuditJobStats::default();

        for job in jobs.values() {
            match job.status() {
                JobStatus::Pending => stats.pending_jobs += 1,
                JobStatus::Running => stats.running_jobs += 1,
                JobStatus::Completed => stats.completed_jobs += 1,
                JobStatus::Failed => stats.failed_jobs += 1,
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl AuditFindingRepository for InMemoryAuditRepository {
    async fn append_finding(&self, finding: NewAuditFinding) -> AppResult<FindingWrite> {
        if !self.jobs.read().await.contains_key(finding.job_id()) {
            return Err(AppError::NotFound(format!(
                "audit job '{}' does not exist",
                finding.job_id()
            )));
        }

        let mut log = self.findings.write().await;
        let duplicate = log.entries.iter().any(|existing| {
            &existing.job_id == finding.job_id()
                && existing.resource_id == finding.resource_id()
                && &existing.check_type == finding.check_type()
        });
        if duplicate {
            return Ok(FindingWrite::Duplicate);
        }

        let now = Utc::now().trunc_subsecs(6);
        let created_at = log
            .last_created_at
            .map_or(now, |previous| previous.max(now));
        log.last_id += 1;
        log.last_created_at = Some(created_at);

        let stored = finding.into_persisted(log.last_id, created_at);
        log.entries.push(stored.clone());

        Ok(FindingWrite::Inserted(stored))
    }

    async fn list_findings(&self, query: &FindingListQuery) -> AppResult<Vec<AuditFinding>> {
        let log = self.findings.read().await;

        Ok(log
            .entries
            .iter()
            .filter(|finding| finding.job_id == query.job_id)
            .filter(|finding| {
                query
                    .severity
                    .is_none_or(|severity| finding.severity == severity)
            })
            .filter(|finding| {
                query
                    .after
                    .is_none_or(|cursor| FindingCursor::after(finding) > cursor)
            })
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn count_findings(&self, job_id: &JobId) -> AppResult<i64> {
        let log = self.findings.read().await;
        let count = log
            .entries
            .iter()
            .filter(|finding| &finding.job_id == job_id)
            .count();

        i64::try_from(count)
            .map_err(|error| AppError::Internal(format!("finding count overflow: {error}")))
    }

    async fn severity_counts(&self) -> AppResult<FindingSeverityCounts> {
        let log = self.findings.read().await;
        let mut counts = FindingSeverityCounts::default();
        for finding in &log.entries {
            counts.add(finding.severity, 1);
        }

        Ok(counts)
    }
}
