use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use auditor_core::{AppError, AppResult, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{AccountTarget, CloudProvider};

const CHECK_NAME_MAX_LENGTH: usize = 64;
const CREDENTIALS_REF_MAX_LENGTH: usize = 256;

/// Error message recorded when the orchestrator abandons a stalled job.
pub const WORKER_TIMEOUT_MESSAGE: &str = "worker timeout";

/// Lifecycle status of one audit job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Persisted and queued, no worker has started it.
    Pending,
    /// A worker owns the job and is executing checks.
    Running,
    /// All checks executed.
    Completed,
    /// The worker reported failure or the job timed out.
    Failed,
}

impl JobStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Running, Self::Completed, Self::Failed];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown audit job status '{value}'"
            ))),
        }
    }

    /// Returns whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether `self -> next` is an edge of the job state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Queue priority requested for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Delivered after medium and high priority work.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Delivered before other work.
    High,
}

impl JobPriority {
    /// All priorities, highest first.
    pub const HIGHEST_FIRST: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses storage or transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(AppError::Validation(format!(
                "unsupported priority '{value}', expected one of low, medium, high"
            ))),
        }
    }

    /// Returns numeric rank used for queue ordering, higher is delivered first.
    #[must_use]
    pub fn rank(&self) -> i16 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// Validated audit check name such as `storage-encryption`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckName(String);

impl CheckName {
    /// Creates a validated lowercase kebab-case check name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "check name must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > CHECK_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "check name must be at most {CHECK_NAME_MAX_LENGTH} characters"
            )));
        }

        let valid_characters = trimmed.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-'
        });
        if !valid_characters || trimmed.starts_with('-') || trimmed.ends_with('-') {
            return Err(AppError::Validation(format!(
                "check name '{trimmed}' must be lowercase kebab-case"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CheckName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for CheckName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CheckName> for String {
    fn from(value: CheckName) -> Self {
        value.0
    }
}

/// Input used to create a new pending audit job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditJobInput {
    /// Job identifier.
    pub job_id: JobId,
    /// Target cloud account.
    pub target: AccountTarget,
    /// Ordered check names.
    pub checks: Vec<CheckName>,
    /// Queue priority.
    pub priority: JobPriority,
    /// Optional opaque credentials reference resolved by workers.
    pub credentials_ref: Option<String>,
}

/// Flat persisted shape of an audit job, validated by [`AuditJob::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditJobRecord {
    /// Job identifier.
    pub job_id: JobId,
    /// Target cloud account.
    pub target: AccountTarget,
    /// Ordered check names.
    pub checks: Vec<CheckName>,
    /// Queue priority.
    pub priority: JobPriority,
    /// Optional credentials reference.
    pub credentials_ref: Option<String>,
    /// Current status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last liveness signal from the owning worker.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Worker that won the start transition.
    pub worker_id: Option<String>,
    /// Failure reason.
    pub error_message: Option<String>,
}

/// One requested audit run against one cloud account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditJob {
    job_id: JobId,
    target: AccountTarget,
    checks: Vec<CheckName>,
    priority: JobPriority,
    credentials_ref: Option<String>,
    status: JobStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    worker_id: Option<String>,
    error_message: Option<String>,
}

impl AuditJob {
    /// Creates a validated pending job.
    pub fn new_pending(input: NewAuditJobInput, created_at: DateTime<Utc>) -> AppResult<Self> {
        let NewAuditJobInput {
            job_id,
            target,
            checks,
            priority,
            credentials_ref,
        } = input;

        validate_checks(&checks)?;
        let credentials_ref = normalize_credentials_ref(credentials_ref)?;

        Ok(Self {
            job_id,
            target,
            checks,
            priority,
            credentials_ref,
            status: JobStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            last_heartbeat_at: None,
            worker_id: None,
            error_message: None,
        })
    }

    /// Rebuilds a job from storage and verifies lifecycle invariants.
    pub fn restore(record: AuditJobRecord) -> AppResult<Self> {
        validate_checks(&record.checks)?;

        let job_id = record.job_id.as_str().to_owned();
        let started = record.started_at.is_some();
        let completed = record.completed_at.is_some();

        if started == (record.status == JobStatus::Pending) {
            return Err(AppError::Internal(format!(
                "audit job '{job_id}' has status '{}' but started_at is {}",
                record.status,
                if started { "set" } else { "missing" }
            )));
        }

        if completed != record.status.is_terminal() {
            return Err(AppError::Internal(format!(
                "audit job '{job_id}' has status '{}' but completed_at is {}",
                record.status,
                if completed { "set" } else { "missing" }
            )));
        }

        if record.worker_id.is_some() && record.status == JobStatus::Pending {
            return Err(AppError::Internal(format!(
                "audit job '{job_id}' is pending but already has an owning worker"
            )));
        }

        if record.error_message.is_some() && record.status != JobStatus::Failed {
            return Err(AppError::Internal(format!(
                "audit job '{job_id}' carries an error_message while '{}'",
                record.status
            )));
        }

        Ok(Self {
            job_id: record.job_id,
            target: record.target,
            checks: record.checks,
            priority: record.priority,
            credentials_ref: record.credentials_ref,
            status: record.status,
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            last_heartbeat_at: record.last_heartbeat_at,
            worker_id: record.worker_id,
            error_message: record.error_message,
        })
    }

    /// Transitions pending to running and records the owning worker.
    pub fn start(&mut self, at: DateTime<Utc>, worker_id: &str) -> AppResult<()> {
        self.ensure_transition(JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(at);
        self.last_heartbeat_at = Some(at);
        self.worker_id = Some(worker_id.to_owned());
        Ok(())
    }

    /// Returns whether `worker_id` owns this job while it runs.
    #[must_use]
    pub fn is_running_on(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Running && self.worker_id.as_deref() == Some(worker_id)
    }

    /// Refreshes the liveness timestamp of a running job.
    pub fn record_heartbeat(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        if self.status != JobStatus::Running {
            return Err(AppError::Conflict(format!(
                "audit job '{}' is '{}' and cannot accept heartbeats",
                self.job_id, self.status
            )));
        }

        self.last_heartbeat_at = Some(at);
        Ok(())
    }

    /// Transitions running to completed.
    pub fn complete(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        self.ensure_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Transitions running to failed with a reason.
    pub fn fail(&mut self, at: DateTime<Utc>, error_message: impl Into<String>) -> AppResult<()> {
        self.ensure_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.completed_at = Some(at);
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Returns the time liveness is measured from for a running job.
    #[must_use]
    pub fn last_liveness_at(&self) -> Option<DateTime<Utc>> {
        match (self.started_at, self.last_heartbeat_at) {
            (Some(started_at), Some(heartbeat_at)) => Some(started_at.max(heartbeat_at)),
            (started_at, heartbeat_at) => started_at.or(heartbeat_at),
        }
    }

    /// Returns job identifier.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Returns target account.
    #[must_use]
    pub fn target(&self) -> &AccountTarget {
        &self.target
    }

    /// Returns target provider.
    #[must_use]
    pub fn cloud_provider(&self) -> CloudProvider {
        self.target.provider()
    }

    /// Returns ordered check names.
    #[must_use]
    pub fn checks(&self) -> &[CheckName] {
        self.checks.as_slice()
    }

    /// Returns queue priority.
    #[must_use]
    pub fn priority(&self) -> JobPriority {
        self.priority
    }

    /// Returns the optional credentials reference.
    #[must_use]
    pub fn credentials_ref(&self) -> Option<&str> {
        self.credentials_ref.as_deref()
    }

    /// Returns current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns start timestamp.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns terminal timestamp.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns last heartbeat timestamp.
    #[must_use]
    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }

    /// Returns the worker that started the job.
    #[must_use]
    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    /// Returns failure reason.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn ensure_transition(&self, next: JobStatus) -> AppResult<()> {
        if self.status.can_transition_to(next) {
            return Ok(());
        }

        Err(AppError::Conflict(format!(
            "audit job '{}' cannot transition from '{}' to '{}'",
            self.job_id, self.status, next
        )))
    }
}

fn validate_checks(checks: &[CheckName]) -> AppResult<()> {
    if checks.is_empty() {
        return Err(AppError::Validation(
            "checks must contain at least one check name".to_owned(),
        ));
    }

    let mut seen = HashSet::with_capacity(checks.len());
    for check in checks {
        if !seen.insert(check.as_str()) {
            return Err(AppError::Validation(format!(
                "check '{check}' is listed more than once"
            )));
        }
    }

    Ok(())
}

fn normalize_credentials_ref(value: Option<String>) -> AppResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.len() > CREDENTIALS_REF_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "credentials_ref must be at most {CREDENTIALS_REF_MAX_LENGTH} characters"
        )));
    }

    Ok(Some(trimmed.to_owned()))
}
