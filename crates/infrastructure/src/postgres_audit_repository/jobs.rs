use super::*;

impl PostgresAuditRepository {
    pub(super) async fn insert_job_impl(&self, job: &AuditJob) -> AppResult<()> {
        let target = job.target();
        let checks: Vec<String> = job
            .checks()
            .iter()
            .map(|check| check.as_str().to_owned())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO audit_jobs (
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.job_id().as_str())
        .bind(job.cloud_provider().as_str())
        .bind(target.subscription_id())
        .bind(target.account_id())
        .bind(target.project_id())
        .bind(job.status().as_str())
        .bind(checks)
        .bind(job.priority().as_str())
        .bind(job.credentials_ref())
        .bind(job.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "audit job '{}' already exists",
                        job.job_id()
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to insert audit job '{}': {error}",
                    job.job_id()
                )))
            }
        }
    }

    pub(super) async fn delete_pending_job_impl(&self, job_id: &JobId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM audit_jobs
            WHERE job_id = $1
              AND status = 'pending'
            "#,
        )
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete pending audit job '{job_id}': {error}"
            ))
        })?;

        Ok(())
    }

    pub(super) async fn find_job_impl(&self, job_id: &JobId) -> AppResult<Option<AuditJob>> {
        let row = sqlx::query_as::<_, AuditJobRow>(
            r#"
            SELECT
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at,
                started_at,
                completed_at,
                last_heartbeat_at,
                worker_id,
                error_message
            FROM audit_jobs
            WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find audit job '{job_id}': {error}"))
        })?;

        row.map(audit_job_from_row).transpose()
    }

    pub(super) async fn transition_to_running_impl(
        &self,
        job_id: &JobId,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let row = sqlx::query_as::<_, AuditJobRow>(
            r#"
            UPDATE audit_jobs
            SET
                status = 'running',
                started_at = $2,
                last_heartbeat_at = $2,
                worker_id = $3
            WHERE job_id = $1
              AND status = 'pending'
            RETURNING
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at,
                started_at,
                completed_at,
                last_heartbeat_at,
                worker_id,
                error_message
            "#,
        )
        .bind(job_id.as_str())
        .bind(at)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark audit job '{job_id}' running: {error}"
            ))
        })?;

        row.map(audit_job_from_row).transpose()
    }

    pub(super) async fn record_heartbeat_impl(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let row = sqlx::query_as::<_, AuditJobRow>(
            r#"
            UPDATE audit_jobs
            SET last_heartbeat_at = GREATEST(last_heartbeat_at, $2)
            WHERE job_id = $1
              AND status = 'running'
            RETURNING
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at,
                started_at,
                completed_at,
                last_heartbeat_at,
                worker_id,
                error_message
            "#,
        )
        .bind(job_id.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record heartbeat for audit job '{job_id}': {error}"
            ))
        })?;

        row.map(audit_job_from_row).transpose()
    }

    pub(super) async fn finish_job_impl(
        &self,
        job_id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let (status, error_message) = match outcome {
            JobOutcome::Completed => (JobStatus::Completed, None),
            JobOutcome::Failed { error_message } => (JobStatus::Failed, Some(error_message)),
        };

        let row = sqlx::query_as::<_, AuditJobRow>(
            r#"
            UPDATE audit_jobs
            SET
                status = $2,
                completed_at = $3,
                error_message = $4
            WHERE job_id = $1
              AND status = 'running'
            RETURNING
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at,
                started_at,
                completed_at,
                last_heartbeat_at,
                worker_id,
                error_message
            "#,
        )
        .bind(job_id.as_str())
        .bind(status.as_str())
        .bind(at)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark audit job '{job_id}' {status}: {error}"
            ))
        })?;

        row.map(audit_job_from_row).transpose()
    }

    pub(super) async fn fail_stalled_jobs_impl(
        &self,
        stalled_before: DateTime<Utc>,
        at: DateTime<Utc>,
        error_message: &str,
    ) -> AppResult<Vec<AuditJob>> {
        let rows = sqlx::query_as::<_, AuditJobRow>(
            r#"
            UPDATE audit_jobs
            SET
                status = 'failed',
                completed_at = $2,
                error_message = $3
            WHERE status = 'running'
              AND GREATEST(started_at, last_heartbeat_at) < $1
            RETURNING
                job_id,
                cloud_provider,
                subscription_id,
                account_id,
                project_id,
                status,
                checks,
                priority,
                credentials_ref,
                created_at,
                started_at,
                completed_at,
                last_heartbeat_at,
                worker_id,
                error_message
            "#,
        )
        .bind(stalled_before)
        .bind(at)
        .bind(error_message)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reap stalled audit jobs: {error}")))?;

        rows.into_iter().map(audit_job_from_row).collect()
    }

    pub(super) async fn job_stats_impl(&self) -> AppResult<AuditJobStats> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT status, COUNT(*)::BIGINT AS count
            FROM audit_jobs
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count audit jobs: {error}")))?;

        let mut stats = AuditJobStats::default();
        for row in rows {
            match JobStatus::parse(row.status.as_str())? {
                JobStatus::Pending => stats.pending_jobs = row.count,
                JobStatus::Running => stats.running_jobs = row.count,
                JobStatus::Completed => stats.completed_jobs = row.count,
                JobStatus::Failed => stats.failed_jobs = row.count,
            }
        }

        Ok(stats)
    }
}
