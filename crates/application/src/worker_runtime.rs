use std::sync::Arc;
use std::time::Duration;

use auditor_core::{AppError, AppResult};
use auditor_domain::{CheckName, JobStatus, NewAuditFinding, NewAuditFindingInput, Severity};
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audit_ports::{
    AuditFindingRepository, AuditTask, AuditTaskQueue, CheckContext, CheckFault, FindingDraft,
    FindingWrite, JobControl, StartOutcome, TaskDelivery,
};
use crate::check_registry::CheckRegistry;

mod execution;

/// Resource type recorded on findings synthesized from check faults.
pub const CHECK_FAULT_RESOURCE_TYPE: &str = "audit_check";

/// Remediation advice attached to check fault findings.
pub const CHECK_FAULT_RECOMMENDATION: &str = "Check worker logs and cloud permissions";

/// Worker runtime tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRuntimeConfig {
    /// Stable worker identity used as queue consumer id.
    pub worker_id: String,
    /// How long a delivered task stays hidden from other consumers.
    pub visibility_timeout: Duration,
    /// How long one dequeue waits for work.
    pub poll_wait: Duration,
    /// Upper bound for one check run.
    pub check_timeout: Duration,
    /// Interval between liveness signals while a job runs.
    pub heartbeat_interval: Duration,
}

impl WorkerRuntimeConfig {
    /// Creates a config with default timings.
    #[must_use]
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            visibility_timeout: Duration::from_secs(120),
            poll_wait: Duration::from_millis(1500),
            check_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(15),
        }
    }

    /// Verifies identity and timing values.
    pub fn validate(&self) -> AppResult<()> {
        if self.worker_id.trim().is_empty() {
            return Err(AppError::Validation(
                "worker_id must not be empty".to_owned(),
            ));
        }

        for (name, value) in [
            ("visibility_timeout", self.visibility_timeout),
            ("poll_wait", self.poll_wait),
            ("check_timeout", self.check_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
        ] {
            if value.is_zero() {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if self.heartbeat_interval >= self.visibility_timeout {
            return Err(AppError::Validation(
                "heartbeat_interval must be shorter than visibility_timeout".to_owned(),
            ));
        }

        Ok(())
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Every check ran and the job was completed.
    Completed {
        /// Findings newly stored.
        findings_written: usize,
        /// Findings ignored because they already existed.
        duplicate_findings: usize,
        /// Checks that faulted and were recorded as critical findings.
        faulted_checks: usize,
    },
    /// The job was completed as failed.
    Failed {
        /// Reason reported to the orchestrator.
        error_message: String,
    },
    /// The job had already left pending; the delivery was acknowledged.
    SkippedDuplicate {
        /// Status observed.
        status: JobStatus,
    },
    /// The job no longer exists; the delivery was acknowledged.
    Dropped,
    /// The orchestrator could not be reached before start; the delivery was returned.
    Abandoned {
        /// Underlying error.
        reason: String,
    },
}

impl ProcessOutcome {
    /// Returns stable outcome label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::SkippedDuplicate { .. } => "skipped_duplicate",
            Self::Dropped => "dropped",
            Self::Abandoned { .. } => "abandoned",
        }
    }
}

/// Counters collected while executing the checks of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ExecutionReport {
    findings_written: usize,
    duplicate_findings: usize,
    faulted_checks: usize,
    store_error: Option<String>,
}

/// Pulls audit tasks from the queue and executes their checks.
#[derive(Clone)]
pub struct AuditWorkerRuntime {
    config: WorkerRuntimeConfig,
    task_queue: Arc<dyn AuditTaskQueue>,
    job_control: Arc<dyn JobControl>,
    finding_repository: Arc<dyn AuditFindingRepository>,
    checks: CheckRegistry,
}

impl AuditWorkerRuntime {
    /// Creates a worker runtime.
    pub fn new(
        config: WorkerRuntimeConfig,
        task_queue: Arc<dyn AuditTaskQueue>,
        job_control: Arc<dyn JobControl>,
        finding_repository: Arc<dyn AuditFindingRepository>,
        checks: CheckRegistry,
    ) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            task_queue,
            job_control,
            finding_repository,
            checks,
        })
    }

    /// Returns runtime config.
    #[must_use]
    pub fn config(&self) -> &WorkerRuntimeConfig {
        &self.config
    }

    /// Waits up to the poll interval for one task and processes it.
    pub async fn poll_once(&self) -> AppResult<Option<ProcessOutcome>> {
        let Some(delivery) = self
            .task_queue
            .dequeue(
                self.config.worker_id.as_str(),
                self.config.visibility_timeout,
                self.config.poll_wait,
            )
            .await?
        else {
            return Ok(None);
        };

        self.process_delivery(delivery).await.map(Some)
    }

    /// Processes one delivery end to end and settles it on the queue.
    pub async fn process_delivery(&self, delivery: TaskDelivery) -> AppResult<ProcessOutcome> {
        let job_id = delivery.task.job_id.clone();
        let worker_id = self.config.worker_id.as_str();

        if delivery.delivery_count > 1 {
            debug!(
                job_id = %job_id,
                worker_id,
                delivery_count = delivery.delivery_count,
                "audit task redelivered"
            );
        }

        let status = match self.job_control.job_status(&job_id).await {
            Ok(status) => status,
            Err(AppError::NotFound(_)) => {
                info!(job_id = %job_id, worker_id, "dropping task for unknown audit job");
                self.task_queue.ack(&delivery).await?;
                return Ok(ProcessOutcome::Dropped);
            }
            Err(error) => return self.abandon(&delivery, error).await,
        };

        if status != JobStatus::Pending {
            debug!(job_id = %job_id, worker_id, status = status.as_str(), "skipping duplicate delivery");
            self.task_queue.ack(&delivery).await?;
            return Ok(ProcessOutcome::SkippedDuplicate { status });
        }

        match self.job_control.start_job(&job_id, worker_id).await {
            Ok(StartOutcome::Started) => {}
            Ok(StartOutcome::AlreadyClaimed { status }) => {
                debug!(job_id = %job_id, worker_id, status = status.as_str(), "lost start race");
                self.task_queue.ack(&delivery).await?;
                return Ok(ProcessOutcome::SkippedDuplicate { status });
            }
            Err(AppError::NotFound(_)) => {
                self.task_queue.ack(&delivery).await?;
                return Ok(ProcessOutcome::Dropped);
            }
            Err(error) => return self.abandon(&delivery, error).await,
        }

        info!(job_id = %job_id, worker_id, checks = delivery.task.checks.len(), "audit job started");

        let report = self.execute_with_heartbeats(&delivery).await;

        let outcome = match report.store_error {
            Some(error_message) => ProcessOutcome::Failed { error_message },
            None => ProcessOutcome::Completed {
                findings_written: report.findings_written,
                duplicate_findings: report.duplicate_findings,
                faulted_checks: report.faulted_checks,
            },
        };

        let completion = match &outcome {
            ProcessOutcome::Failed { error_message } => {
                self.job_control
                    .complete_job(&job_id, false, Some(error_message.clone()))
                    .await
            }
            _ => self.job_control.complete_job(&job_id, true, None).await,
        };

        if let Err(error) = completion {
            warn!(job_id = %job_id, worker_id, error = %error, "failed to report audit job completion");
        }

        if let Err(error) = self.task_queue.ack(&delivery).await {
            warn!(job_id = %job_id, worker_id, error = %error, "failed to acknowledge audit task");
        }

        info!(job_id = %job_id, worker_id, outcome = outcome.as_str(), "audit job processed");
        Ok(outcome)
    }

    async fn abandon(
        &self,
        delivery: &TaskDelivery,
        error: AppError,
    ) -> AppResult<ProcessOutcome> {
        warn!(
            job_id = %delivery.task.job_id,
            worker_id = self.config.worker_id.as_str(),
            error = %error,
            "orchestrator unavailable, returning audit task"
        );
        self.task_queue.nack(delivery).await?;
        Ok(ProcessOutcome::Abandoned {
            reason: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests;
