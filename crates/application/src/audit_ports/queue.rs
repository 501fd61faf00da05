use std::time::Duration;

use async_trait::async_trait;
use auditor_core::{AppResult, JobId};
use auditor_domain::{AccountTarget, AuditJob, CheckName, JobPriority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Work item carried by the queue transport, one per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTask {
    /// Job to execute.
    pub job_id: JobId,
    /// Target cloud account.
    pub target: AccountTarget,
    /// Optional opaque credentials reference.
    pub credentials_ref: Option<String>,
    /// Ordered checks to execute.
    pub checks: Vec<CheckName>,
    /// Delivery priority.
    pub priority: JobPriority,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}

impl AuditTask {
    /// Builds the task describing one pending job.
    #[must_use]
    pub fn for_job(job: &AuditJob) -> Self {
        Self {
            job_id: job.job_id().clone(),
            target: job.target().clone(),
            credentials_ref: job.credentials_ref().map(ToOwned::to_owned),
            checks: job.checks().to_vec(),
            priority: job.priority(),
            enqueued_at: Utc::now(),
        }
    }
}

/// One delivery of a task to one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDelivery {
    /// Transport-assigned task identifier, stable across redeliveries.
    pub task_id: String,
    /// Fencing token for this delivery; ack/nack/extend only apply while it matches.
    pub receipt: String,
    /// 1-based number of times the task has been delivered.
    pub delivery_count: u32,
    /// Task payload.
    pub task: AuditTask,
}

/// Queue depth snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    /// Tasks waiting for a consumer.
    pub ready: i64,
    /// Tasks currently held by a consumer.
    pub in_flight: i64,
}

/// At-least-once competing-consumers queue port.
#[async_trait]
pub trait AuditTaskQueue: Send + Sync {
    /// Durably enqueues one task and returns its identifier.
    async fn enqueue(&self, task: AuditTask) -> AppResult<String>;

    /// Waits up to `wait` for a task and hides it from other consumers for
    /// `visibility_timeout`.
    async fn dequeue(
        &self,
        consumer_id: &str,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> AppResult<Option<TaskDelivery>>;

    /// Removes a delivered task permanently.
    async fn ack(&self, delivery: &TaskDelivery) -> AppResult<()>;

    /// Returns a delivered task to the ready set for immediate redelivery.
    async fn nack(&self, delivery: &TaskDelivery) -> AppResult<()>;

    /// Pushes the visibility deadline of a delivery; false when the receipt is stale.
    async fn extend_visibility(
        &self,
        delivery: &TaskDelivery,
        visibility_timeout: Duration,
    ) -> AppResult<bool>;

    /// Returns ready and in-flight task counts.
    async fn depth(&self) -> AppResult<QueueDepth>;
}
