use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{
    AccountTarget, AuditFinding, AuditJob, CheckName, CloudProvider, JobStatus, NewAuditFinding,
    Severity,
};
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Mutex;

use crate::audit_ports::{
    AuditCheck, AuditFindingRepository, AuditJobRepository, AuditJobStats, AuditTask,
    AuditTaskQueue, CheckContext, CheckDescriptor, CheckFault, FindingDraft, FindingListQuery,
    FindingSeverityCounts, FindingWrite, JobControl, JobOutcome, JobStatusEvent,
    JobStatusEventPublisher, QueueDepth, ReaperLease, ReaperLeaseCoordinator, StartOutcome,
    TaskDelivery,
};
use crate::{AuditService, CheckRegistry};

#[derive(Default)]
pub(crate) struct FakeJobRepository {
    jobs: Mutex<HashMap<String, AuditJob>>,
    lookups: AtomicUsize,
}

impl FakeJobRepository {
    pub(crate) async fn put(&self, job: AuditJob) {
        self.jobs
            .lock()
            .await
            .insert(job.job_id().as_str().to_owned(), job);
    }

    pub(crate) async fn get(&self, job_id: &str) -> Option<AuditJob> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub(crate) async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditJobRepository for FakeJobRepository {
    async fn insert_job(&self, job: &AuditJob) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(job.job_id().as_str()) {
            return Err(AppError::Conflict(format!(
                "audit job '{}' already exists",
                job.job_id()
            )));
        }

        jobs.insert(job.job_id().as_str().to_owned(), job.clone());
        Ok(())
    }

    async fn delete_pending_job(&self, job_id: &JobId) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs
            .get(job_id.as_str())
            .is_some_and(|job| job.status() == JobStatus::Pending)
        {
            jobs.remove(job_id.as_str());
        }
        Ok(())
    }

    async fn find_job(&self, job_id: &JobId) -> AppResult<Option<AuditJob>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(job_id.as_str()).await)
    }

    async fn transition_to_running(
        &self,
        job_id: &JobId,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id.as_str()) else {
            return Ok(None);
        };
        if job.status() != JobStatus::Pending {
            return Ok(None);
        }

        job.start(at, worker_id)?;
        Ok(Some(job.clone()))
    }

    async fn record_heartbeat(
        &self,
        job_id: &JobId,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id.as_str()) else {
            return Ok(None);
        };
        if job.status() != JobStatus::Running {
            return Ok(None);
        }

        job.record_heartbeat(at)?;
        Ok(Some(job.clone()))
    }

    async fn finish_job(
        &self,
        job_id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<Option<AuditJob>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id.as_str()) else {
            return Ok(None);
        };
        if job.status() != JobStatus::Running {
            return Ok(None);
        }

        match outcome {
            JobOutcome::Completed => job.complete(at)?,
            JobOutcome::Failed { error_message } => job.fail(at, error_message)?,
        }
        Ok(Some(job.clone()))
    }

    async fn fail_stalled_jobs(
        &self,
        stalled_before: DateTime<Utc>,
        at: DateTime<Utc>,
        error_message: &str,
    ) -> AppResult<Vec<AuditJob>> {
        let mut jobs = self.jobs.lock().await;
        let mut reaped = Vec::new();
        for job in jobs.values_mut() {
            let stalled = job.status() == JobStatus::Running
                && job
                    .last_liveness_at()
                    .is_some_and(|liveness| liveness < stalled_before);
            if stalled {
                job.fail(at, error_message)?;
                reaped.push(job.clone());
            }
        }
        Ok(reaped)
    }

    async fn job_stats(&self) -> AppResult<AuditJobStats> {
        let mut stats = AuditJobStats::default();
        for job in self.jobs.lock().await.values() {
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

#[derive(Default)]
pub(crate) struct FakeFindingRepository {
    findings: Mutex<Vec<AuditFinding>>,
    fail_writes: AtomicBool,
}

impl FakeFindingRepository {
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn all(&self) -> Vec<AuditFinding> {
        self.findings.lock().await.clone()
    }
}

#[async_trait]
impl AuditFindingRepository for FakeFindingRepository {
    async fn append_finding(&self, finding: NewAuditFinding) -> AppResult<FindingWrite> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("result store unavailable".to_owned()));
        }

        let mut findings = self.findings.lock().await;
        let duplicate = findings.iter().any(|existing| {
            &existing.job_id == finding.job_id()
                && existing.resource_id == finding.resource_id()
                && &existing.check_type == finding.check_type()
        });
        if duplicate {
            return Ok(FindingWrite::Duplicate);
        }

        let now = Utc::now().trunc_subsecs(6);
        let created_at = findings
            .last()
            .map_or(now, |last| last.created_at.max(now));
        let id = i64::try_from(findings.len() + 1)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        let persisted = finding.into_persisted(id, created_at);
        findings.push(persisted.clone());
        Ok(FindingWrite::Inserted(persisted))
    }

    async fn list_findings(&self, query: &FindingListQuery) -> AppResult<Vec<AuditFinding>> {
        let mut findings: Vec<AuditFinding> = self
            .findings
            .lock()
            .await
            .iter()
            .filter(|finding| finding.job_id == query.job_id)
            .filter(|finding| query.severity.is_none_or(|severity| finding.severity == severity))
            .filter(|finding| {
                query
                    .after
                    .is_none_or(|cursor| (finding.created_at, finding.id) > (cursor.created_at, cursor.id))
            })
            .cloned()
            .collect();
        findings.sort_by_key(|finding| (finding.created_at, finding.id));
        findings.truncate(query.limit);
        Ok(findings)
    }

    async fn count_findings(&self, job_id: &JobId) -> AppResult<i64> {
        let count = self
            .findings
            .lock()
            .await
            .iter()
            .filter(|finding| &finding.job_id == job_id)
            .count();
        i64::try_from(count).map_err(|error| AppError::Internal(error.to_string()))
    }

    async fn severity_counts(&self) -> AppResult<FindingSeverityCounts> {
        let mut counts = FindingSeverityCounts::default();
        for finding in self.findings.lock().await.iter() {
            counts.add(finding.severity, 1);
        }
        Ok(counts)
    }
}

#[derive(Default)]
struct FakeQueueState {
    ready: VecDeque<(String, AuditTask, u32)>,
    in_flight: HashMap<String, (String, AuditTask, u32)>,
    acked: Vec<String>,
    nacked: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeTaskQueue {
    state: Mutex<FakeQueueState>,
    fail_enqueue: AtomicBool,
    next_id: AtomicUsize,
    extensions: AtomicUsize,
}

impl FakeTaskQueue {
    pub(crate) fn fail_enqueue(&self) {
        self.fail_enqueue.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub(crate) async fn acked(&self) -> Vec<String> {
        self.state.lock().await.acked.clone()
    }

    pub(crate) async fn nacked(&self) -> Vec<String> {
        self.state.lock().await.nacked.clone()
    }

    pub(crate) fn extensions(&self) -> usize {
        self.extensions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditTaskQueue for FakeTaskQueue {
    async fn enqueue(&self, task: AuditTask) -> AppResult<String> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(AppError::Internal("queue transport unavailable".to_owned()));
        }

        let task_id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.state
            .lock()
            .await
            .ready
            .push_back((task_id.clone(), task, 0));
        Ok(task_id)
    }

    async fn dequeue(
        &self,
        _consumer_id: &str,
        _visibility_timeout: Duration,
        _wait: Duration,
    ) -> AppResult<Option<TaskDelivery>> {
        let mut state = self.state.lock().await;
        let Some((task_id, task, deliveries)) = state.ready.pop_front() else {
            return Ok(None);
        };

        let delivery_count = deliveries + 1;
        let receipt = format!("{task_id}-r{delivery_count}");
        state.in_flight.insert(
            task_id.clone(),
            (receipt.clone(), task.clone(), delivery_count),
        );

        Ok(Some(TaskDelivery {
            task_id,
            receipt,
            delivery_count,
            task,
        }))
    }

    async fn ack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let held = state
            .in_flight
            .get(&delivery.task_id)
            .is_some_and(|(receipt, _, _)| receipt == &delivery.receipt);
        if held {
            state.in_flight.remove(&delivery.task_id);
        }
        state.acked.push(delivery.receipt.clone());
        Ok(())
    }

    async fn nack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some((receipt, task, deliveries)) = state.in_flight.remove(&delivery.task_id) else {
            return Err(AppError::Conflict(format!(
                "task '{}' is not held by receipt '{}'",
                delivery.task_id, delivery.receipt
            )));
        };
        if receipt != delivery.receipt {
            state
                .in_flight
                .insert(delivery.task_id.clone(), (receipt, task, deliveries));
            return Err(AppError::Conflict(format!(
                "task '{}' is not held by receipt '{}'",
                delivery.task_id, delivery.receipt
            )));
        }

        state
            .ready
            .push_front((delivery.task_id.clone(), task, deliveries));
        state.nacked.push(delivery.receipt.clone());
        Ok(())
    }

    async fn extend_visibility(
        &self,
        delivery: &TaskDelivery,
        _visibility_timeout: Duration,
    ) -> AppResult<bool> {
        self.extensions.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .await
            .in_flight
            .get(&delivery.task_id)
            .is_some_and(|(receipt, _, _)| receipt == &delivery.receipt))
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let state = self.state.lock().await;
        Ok(QueueDepth {
            ready: i64::try_from(state.ready.len())
                .map_err(|error| AppError::Internal(error.to_string()))?,
            in_flight: i64::try_from(state.in_flight.len())
                .map_err(|error| AppError::Internal(error.to_string()))?,
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingEventPublisher {
    events: Mutex<Vec<JobStatusEvent>>,
}

impl RecordingEventPublisher {
    pub(crate) async fn statuses(&self) -> Vec<JobStatus> {
        self.events
            .lock()
            .await
            .iter()
            .map(|event| event.status)
            .collect()
    }
}

#[async_trait]
impl JobStatusEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &JobStatusEvent) -> AppResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLeaseCoordinator {
    holder: Mutex<Option<String>>,
    releases: AtomicUsize,
}

impl FakeLeaseCoordinator {
    pub(crate) async fn hold_for(&self, holder_id: &str) {
        *self.holder.lock().await = Some(holder_id.to_owned());
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReaperLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<ReaperLease>> {
        let mut holder = self.holder.lock().await;
        if holder.as_deref().is_some_and(|current| current != holder_id) {
            return Ok(None);
        }

        *holder = Some(holder_id.to_owned());
        Ok(Some(ReaperLease {
            scope_key: scope_key.to_owned(),
            token: format!("token-{holder_id}"),
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &ReaperLease) -> AppResult<()> {
        let mut holder = self.holder.lock().await;
        if holder.as_deref() == Some(lease.holder_id.as_str()) {
            *holder = None;
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Job control whose transport is always down.
pub(crate) struct UnreachableJobControl;

#[async_trait]
impl JobControl for UnreachableJobControl {
    async fn job_status(&self, _job_id: &JobId) -> AppResult<JobStatus> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn start_job(&self, _job_id: &JobId, _worker_id: &str) -> AppResult<StartOutcome> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn heartbeat(&self, _job_id: &JobId) -> AppResult<()> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn complete_job(
        &self,
        _job_id: &JobId,
        _success: bool,
        _error_message: Option<String>,
    ) -> AppResult<()> {
        Err(AppError::Internal("connection refused".to_owned()))
    }
}

pub(crate) enum CheckBehavior {
    Findings(Vec<FindingDraft>),
    Fail(String),
    Hang(Duration),
}

pub(crate) struct ScriptedCheck {
    descriptor: CheckDescriptor,
    behavior: CheckBehavior,
    runs: AtomicUsize,
}

impl ScriptedCheck {
    pub(crate) fn new(name: &str, providers: &[CloudProvider], behavior: CheckBehavior) -> Self {
        Self {
            descriptor: CheckDescriptor {
                name: check_name(name),
                summary: format!("scripted {name}"),
                providers: providers.to_vec(),
            },
            behavior,
            runs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditCheck for ScriptedCheck {
    fn descriptor(&self) -> &CheckDescriptor {
        &self.descriptor
    }

    async fn run(&self, _context: &CheckContext) -> Result<Vec<FindingDraft>, CheckFault> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            CheckBehavior::Findings(drafts) => Ok(drafts.clone()),
            CheckBehavior::Fail(message) => Err(CheckFault::Failed(message.clone())),
            CheckBehavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Vec::new())
            }
        }
    }
}

pub(crate) fn check_name(name: &str) -> CheckName {
    CheckName::new(name).unwrap_or_else(|error| panic!("invalid check name '{name}': {error}"))
}

pub(crate) fn draft(resource_id: &str, severity: Severity) -> FindingDraft {
    FindingDraft {
        resource_id: resource_id.to_owned(),
        resource_type: "storage_account".to_owned(),
        severity,
        description: format!("issue on {resource_id}"),
        recommendation: Some("fix it".to_owned()),
        metadata: None,
    }
}

pub(crate) fn azure_target() -> AccountTarget {
    AccountTarget::Azure {
        subscription_id: "sub-1".to_owned(),
    }
}

pub(crate) struct Harness {
    pub(crate) service: AuditService,
    pub(crate) jobs: Arc<FakeJobRepository>,
    pub(crate) findings: Arc<FakeFindingRepository>,
    pub(crate) queue: Arc<FakeTaskQueue>,
    pub(crate) registry: CheckRegistry,
}

impl Harness {
    pub(crate) fn new(checks: Vec<Arc<dyn AuditCheck>>) -> Self {
        let registry = CheckRegistry::from_checks(checks)
            .unwrap_or_else(|error| panic!("registry should build: {error}"));
        let catalog = registry
            .catalog()
            .unwrap_or_else(|error| panic!("catalog should build: {error}"));
        let jobs = Arc::new(FakeJobRepository::default());
        let findings = Arc::new(FakeFindingRepository::default());
        let queue = Arc::new(FakeTaskQueue::default());
        let service = AuditService::new(jobs.clone(), findings.clone(), queue.clone(), catalog);

        Self {
            service,
            jobs,
            findings,
            queue,
            registry,
        }
    }
}
