use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{
    AccountTarget, AuditJob, CloudProvider, JobPriority, JobStatus, NewAuditJobInput,
    WORKER_TIMEOUT_MESSAGE,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audit_ports::{
    AuditFindingRepository, AuditJobRepository, AuditJobStats, AuditTask, AuditTaskQueue,
    FindingCursor, FindingListQuery, FindingPage, FindingSeverityCounts, JobControl, JobOutcome,
    JobStatusEvent, JobStatusEventPublisher, QueueDepth, ReaperLeaseCoordinator, StartOutcome,
};
use crate::check_registry::CheckCatalog;

mod lifecycle;
mod queries;
mod reaper;
mod submit;

/// Default maximum time a running job may stay silent before it is reaped.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(300);

/// Error message stored when a worker reports failure without a reason.
pub const WORKER_REPORTED_FAILURE_MESSAGE: &str = "worker reported failure";

/// Default number of findings returned per page.
pub const DEFAULT_FINDINGS_PAGE_SIZE: usize = 100;

/// Largest accepted findings page size.
pub const MAX_FINDINGS_PAGE_SIZE: usize = 500;

const REAPER_LEASE_SCOPE: &str = "audit-stall-reaper";

/// Raw audit request fields as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitAuditInput {
    /// Optional caller-supplied job identifier.
    pub job_id: Option<String>,
    /// Cloud provider name.
    pub cloud_provider: String,
    /// Azure subscription identifier.
    pub subscription_id: Option<String>,
    /// AWS account identifier.
    pub account_id: Option<String>,
    /// GCP project identifier.
    pub project_id: Option<String>,
    /// Optional opaque credentials reference.
    pub credentials_ref: Option<String>,
    /// Requested checks; `None` selects every check supporting the provider.
    pub checks: Option<Vec<String>>,
    /// Optional priority name, defaults to medium.
    pub priority: Option<String>,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAuditOutcome {
    /// Created pending job.
    pub job: AuditJob,
    /// Queue transport task identifier.
    pub task_id: String,
    /// Ready tasks observed right after enqueue, when the transport could report it.
    pub queue_position: Option<i64>,
}

/// Operational snapshot of jobs, findings and queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOverview {
    /// Job counts per status.
    pub jobs: AuditJobStats,
    /// Finding counts per severity.
    pub findings: FindingSeverityCounts,
    /// Queue depth, absent when the transport is unreachable.
    pub queue: Option<QueueDepth>,
}

/// Orchestrator service that owns the audit job lifecycle.
#[derive(Clone)]
pub struct AuditService {
    job_repository: Arc<dyn AuditJobRepository>,
    finding_repository: Arc<dyn AuditFindingRepository>,
    task_queue: Arc<dyn AuditTaskQueue>,
    check_catalog: CheckCatalog,
    liveness_window: Duration,
    event_publisher: Option<Arc<dyn JobStatusEventPublisher>>,
    reaper_lease: Option<(Arc<dyn ReaperLeaseCoordinator>, String)>,
    reaper_lease_seconds: u32,
}

impl AuditService {
    /// Creates an audit service.
    #[must_use]
    pub fn new(
        job_repository: Arc<dyn AuditJobRepository>,
        finding_repository: Arc<dyn AuditFindingRepository>,
        task_queue: Arc<dyn AuditTaskQueue>,
        check_catalog: CheckCatalog,
    ) -> Self {
        Self {
            job_repository,
            finding_repository,
            task_queue,
            check_catalog,
            liveness_window: DEFAULT_LIVENESS_WINDOW,
            event_publisher: None,
            reaper_lease: None,
            reaper_lease_seconds: 0,
        }
    }

    /// Overrides the liveness window used by the stall reaper.
    #[must_use]
    pub fn with_liveness_window(mut self, liveness_window: Duration) -> Self {
        self.liveness_window = liveness_window;
        self
    }

    /// Adds optional status change publishing.
    #[must_use]
    pub fn with_event_publisher(mut self, event_publisher: Arc<dyn JobStatusEventPublisher>) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }

    /// Adds distributed coordination so one replica sweeps stalled jobs per cycle.
    #[must_use]
    pub fn with_reaper_lease(
        mut self,
        coordinator: Arc<dyn ReaperLeaseCoordinator>,
        holder_id: impl Into<String>,
        lease_seconds: u32,
    ) -> Self {
        self.reaper_lease = Some((coordinator, holder_id.into()));
        self.reaper_lease_seconds = lease_seconds;
        self
    }

    /// Returns the check catalog used for request validation.
    #[must_use]
    pub fn check_catalog(&self) -> &CheckCatalog {
        &self.check_catalog
    }

    /// Returns the configured liveness window.
    #[must_use]
    pub fn liveness_window(&self) -> Duration {
        self.liveness_window
    }

    async fn publish_transition(&self, job: &AuditJob) {
        let Some(publisher) = &self.event_publisher else {
            return;
        };

        let event = JobStatusEvent::from_job(job);
        if let Err(error) = publisher.publish(&event).await {
            warn!(
                job_id = %event.job_id,
                status = event.status.as_str(),
                error = %error,
                "failed to publish job status event"
            );
        }
    }

    async fn require_job(&self, job_id: &JobId) -> AppResult<AuditJob> {
        self.job_repository
            .find_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("audit job '{job_id}' not found")))
    }
}

#[async_trait]
impl JobControl for AuditService {
    async fn job_status(&self, job_id: &JobId) -> AppResult<JobStatus> {
        Ok(self.get_status(job_id).await?.status())
    }

    async fn start_job(&self, job_id: &JobId, worker_id: &str) -> AppResult<StartOutcome> {
        self.mark_running(job_id, worker_id).await
    }

    async fn heartbeat(&self, job_id: &JobId) -> AppResult<()> {
        self.on_worker_heartbeat(job_id).await.map(|_| ())
    }

    async fn complete_job(
        &self,
        job_id: &JobId,
        success: bool,
        error_message: Option<String>,
    ) -> AppResult<()> {
        self.on_worker_complete(job_id, success, error_message)
            .await
            .map(|_| ())
    }
}
