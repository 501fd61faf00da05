use super::*;

impl AuditService {
    /// Returns one job by identifier.
    pub async fn get_status(&self, job_id: &JobId) -> AppResult<AuditJob> {
        self.require_job(job_id).await
    }

    /// Returns the number of findings recorded for one job.
    pub async fn findings_count(&self, job_id: &JobId) -> AppResult<u64> {
        self.require_job(job_id).await?;
        self.count_findings_of(job_id).await
    }

    /// Returns one job with its findings count, loading the job row once.
    pub async fn job_summary(&self, job_id: &JobId) -> AppResult<(AuditJob, u64)> {
        let job = self.require_job(job_id).await?;
        let findings_count = self.count_findings_of(job.job_id()).await?;
        Ok((job, findings_count))
    }

    async fn count_findings_of(&self, job_id: &JobId) -> AppResult<u64> {
        let count = self.finding_repository.count_findings(job_id).await?;
        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid findings count {count}: {error}")))
    }

    /// Lists one page of findings ordered by creation time.
    pub async fn list_findings(&self, query: FindingListQuery) -> AppResult<FindingPage> {
        if query.limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        if query.limit > MAX_FINDINGS_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "limit must be at most {MAX_FINDINGS_PAGE_SIZE}"
            )));
        }

        self.require_job(&query.job_id).await?;

        let findings = self.finding_repository.list_findings(&query).await?;
        let next_cursor = if findings.len() == query.limit {
            findings.last().map(FindingCursor::after)
        } else {
            None
        };

        Ok(FindingPage {
            findings,
            next_cursor,
        })
    }

    /// Returns job, finding and queue counters.
    pub async fn overview(&self) -> AppResult<AuditOverview> {
        let jobs = self.job_repository.job_stats().await?;
        let findings = self.finding_repository.severity_counts().await?;
        let queue = match self.task_queue.depth().await {
            Ok(depth) => Some(depth),
            Err(error) => {
                warn!(error = %error, "queue depth unavailable for overview");
                None
            }
        };

        Ok(AuditOverview {
            jobs,
            findings,
            queue,
        })
    }
}
