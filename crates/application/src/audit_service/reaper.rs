use super::*;

impl AuditService {
    /// Fails every running job that stayed silent longer than the liveness window.
    ///
    /// Returns the reaped job identifiers. When a reaper lease is configured and another
    /// replica holds it, nothing is swept. A successful sweep keeps the lease until it
    /// expires so no other replica sweeps in the same cycle; a failed sweep releases it.
    pub async fn reap_stalled_jobs(&self) -> AppResult<Vec<JobId>> {
        let Some((coordinator, holder_id)) = &self.reaper_lease else {
            return self.sweep_stalled_jobs().await;
        };

        let Some(lease) = coordinator
            .try_acquire_lease(
                REAPER_LEASE_SCOPE,
                holder_id.as_str(),
                self.reaper_lease_seconds.max(1),
            )
            .await?
        else {
            debug!(holder_id = %holder_id, "stall reaper lease held elsewhere");
            return Ok(Vec::new());
        };

        let result = self.sweep_stalled_jobs().await;

        if result.is_err()
            && let Err(error) = coordinator.release_lease(&lease).await
        {
            warn!(holder_id = %holder_id, error = %error, "failed to release stall reaper lease");
        }

        result
    }

    async fn sweep_stalled_jobs(&self) -> AppResult<Vec<JobId>> {
        let window = chrono::Duration::from_std(self.liveness_window).map_err(|error| {
            AppError::Validation(format!("invalid liveness window: {error}"))
        })?;
        let now = Utc::now();
        let stalled_before = now.checked_sub_signed(window).ok_or_else(|| {
            AppError::Validation(format!(
                "liveness window of {}s reaches before the supported time range",
                self.liveness_window.as_secs()
            ))
        })?;

        let reaped = self
            .job_repository
            .fail_stalled_jobs(stalled_before, now, WORKER_TIMEOUT_MESSAGE)
            .await?;

        for job in &reaped {
            warn!(
                job_id = %job.job_id(),
                last_liveness_at = ?job.last_liveness_at(),
                "audit job reaped after worker timeout"
            );
            self.publish_transition(job).await;
        }

        Ok(reaped.into_iter().map(|job| job.job_id().clone()).collect())
    }
}
