//! Redis pub/sub publisher for job status changes.

use async_trait::async_trait;
use auditor_application::{JobStatusEvent, JobStatusEventPublisher};
use auditor_core::{AppError, AppResult};
use redis::AsyncCommands;

/// Default channel status events are published on.
pub const DEFAULT_JOB_STATUS_CHANNEL: &str = "auditor:job-status";

/// Publishes JSON-encoded job status events with `PUBLISH`.
#[derive(Clone)]
pub struct RedisJobStatusEventPublisher {
    client: redis::Client,
    channel: String,
}

impl RedisJobStatusEventPublisher {
    /// Creates a publisher for one channel.
    #[must_use]
    pub fn new(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }

    /// Returns the channel events are published on.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.channel.as_str()
    }
}

#[async_trait]
impl JobStatusEventPublisher for RedisJobStatusEventPublisher {
    async fn publish(&self, event: &JobStatusEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize status event for audit job '{}': {error}",
                event.job_id
            ))
        })?;

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let receivers: i64 = connection
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to publish status event for audit job '{}': {error}",
                    event.job_id
                ))
            })?;

        tracing::debug!(
            job_id = %event.job_id,
            status = %event.status,
            receivers,
            "published audit job status event"
        );

        Ok(())
    }
}
