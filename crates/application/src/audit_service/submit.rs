use super::*;

impl AuditService {
    /// Validates a request, stores a pending job and hands it to the queue transport.
    ///
    /// When enqueue fails the pending job is deleted and `Dispatch` is returned.
    pub async fn submit(&self, input: SubmitAuditInput) -> AppResult<SubmitAuditOutcome> {
        let provider = CloudProvider::parse(input.cloud_provider.as_str())?;
        let target = AccountTarget::from_parts(
            provider,
            input.subscription_id,
            input.account_id,
            input.project_id,
        )?;
        let checks = self.check_catalog.resolve(provider, input.checks)?;
        let priority = match input.priority.as_deref() {
            Some(value) if !value.trim().is_empty() => JobPriority::parse(value)?,
            _ => JobPriority::default(),
        };
        let job_id = match input.job_id {
            Some(value) => JobId::new(value)?,
            None => JobId::generate(),
        };

        let job = AuditJob::new_pending(
            NewAuditJobInput {
                job_id,
                target,
                checks,
                priority,
                credentials_ref: input.credentials_ref,
            },
            Utc::now(),
        )?;

        self.job_repository.insert_job(&job).await?;

        let task_id = match self.task_queue.enqueue(AuditTask::for_job(&job)).await {
            Ok(task_id) => task_id,
            Err(error) => {
                warn!(job_id = %job.job_id(), error = %error, "failed to enqueue audit task");
                if let Err(rollback_error) =
                    self.job_repository.delete_pending_job(job.job_id()).await
                {
                    return Err(AppError::Dispatch(format!(
                        "failed to enqueue audit job '{}': {error}; additionally failed to roll back pending job: {rollback_error}",
                        job.job_id()
                    )));
                }

                return Err(AppError::Dispatch(format!(
                    "failed to enqueue audit job '{}': {error}",
                    job.job_id()
                )));
            }
        };

        let queue_position = match self.task_queue.depth().await {
            Ok(depth) => Some(depth.ready),
            Err(error) => {
                debug!(job_id = %job.job_id(), error = %error, "queue depth unavailable after enqueue");
                None
            }
        };

        info!(
            job_id = %job.job_id(),
            cloud_provider = provider.as_str(),
            priority = priority.as_str(),
            checks = job.checks().len(),
            "audit job submitted"
        );

        Ok(SubmitAuditOutcome {
            job,
            task_id,
            queue_position,
        })
    }
}
