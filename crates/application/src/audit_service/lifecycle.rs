use super::*;

impl AuditService {
    /// Requests the pending to running transition for one job on behalf of a worker.
    ///
    /// A repeated request from the worker that already owns the running job is
    /// answered with `Started`.
    pub async fn mark_running(&self, job_id: &JobId, worker_id: &str) -> AppResult<StartOutcome> {
        match self
            .job_repository
            .transition_to_running(job_id, worker_id, Utc::now())
            .await?
        {
            Some(job) => {
                info!(job_id = %job_id, worker_id, "audit job running");
                self.publish_transition(&job).await;
                Ok(StartOutcome::Started)
            }
            None => {
                let job = self.require_job(job_id).await?;
                if job.is_running_on(worker_id) {
                    debug!(job_id = %job_id, worker_id, "repeated start from owning worker");
                    return Ok(StartOutcome::Started);
                }

                debug!(job_id = %job_id, worker_id, status = job.status().as_str(), "audit job already claimed");
                Ok(StartOutcome::AlreadyClaimed {
                    status: job.status(),
                })
            }
        }
    }

    /// Refreshes liveness of a running job.
    pub async fn on_worker_heartbeat(&self, job_id: &JobId) -> AppResult<AuditJob> {
        match self
            .job_repository
            .record_heartbeat(job_id, Utc::now())
            .await?
        {
            Some(job) => Ok(job),
            None => {
                let job = self.require_job(job_id).await?;
                Err(AppError::Conflict(format!(
                    "audit job '{job_id}' is '{}' and cannot accept heartbeats",
                    job.status()
                )))
            }
        }
    }

    /// Moves a running job to completed or failed.
    pub async fn on_worker_complete(
        &self,
        job_id: &JobId,
        success: bool,
        error_message: Option<String>,
    ) -> AppResult<AuditJob> {
        let outcome = if success {
            JobOutcome::Completed
        } else {
            let error_message = error_message
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| WORKER_REPORTED_FAILURE_MESSAGE.to_owned());
            JobOutcome::Failed { error_message }
        };

        match self
            .job_repository
            .finish_job(job_id, outcome, Utc::now())
            .await?
        {
            Some(job) => {
                info!(
                    job_id = %job_id,
                    status = job.status().as_str(),
                    error = job.error_message().unwrap_or_default(),
                    "audit job finished"
                );
                self.publish_transition(&job).await;
                Ok(job)
            }
            None => {
                let job = self.require_job(job_id).await?;
                Err(AppError::Conflict(format!(
                    "audit job '{job_id}' is '{}' and cannot be completed",
                    job.status()
                )))
            }
        }
    }
}
