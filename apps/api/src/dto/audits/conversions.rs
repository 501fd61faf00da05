use auditor_application::{
    AuditJobStats, FindingSeverityCounts, QueueDepth, SubmitAuditInput, SubmitAuditOutcome,
};
use auditor_domain::{AuditFinding, AuditJob};

use super::types::{
    AuditJobResponse, FindingResponse, JobCountsResponse, QueueDepthResponse,
    SeverityCountsResponse, SubmitAuditRequest, SubmitAuditResponse,
};

impl From<SubmitAuditRequest> for SubmitAuditInput {
    fn from(value: SubmitAuditRequest) -> Self {
        Self {
            job_id: value.job_id,
            cloud_provider: value.cloud_provider,
            subscription_id: value.subscription_id,
            account_id: value.account_id,
            project_id: value.project_id,
            credentials_ref: value.credentials_ref,
            checks: value.checks,
            priority: value.priority,
        }
    }
}

impl From<SubmitAuditOutcome> for SubmitAuditResponse {
    fn from(value: SubmitAuditOutcome) -> Self {
        let check_count = value.job.checks().len();
        Self {
            job_id: value.job.job_id().to_string(),
            status: value.job.status().as_str().to_owned(),
            message: format!("Audit job queued with {check_count} checks"),
            queue_position: value.queue_position,
        }
    }
}

impl AuditJobResponse {
    /// Builds the job view with its current finding count.
    #[must_use]
    pub fn from_job(job: &AuditJob, findings_count: u64) -> Self {
        let target = job.target();
        Self {
            job_id: job.job_id().to_string(),
            status: job.status().as_str().to_owned(),
            cloud_provider: job.cloud_provider().as_str().to_owned(),
            subscription_id: target.subscription_id().map(ToOwned::to_owned),
            account_id: target.account_id().map(ToOwned::to_owned),
            project_id: target.project_id().map(ToOwned::to_owned),
            checks: job
                .checks()
                .iter()
                .map(|check| check.as_str().to_owned())
                .collect(),
            priority: job.priority().as_str().to_owned(),
            created_at: job.created_at().to_rfc3339(),
            started_at: job.started_at().map(|timestamp| timestamp.to_rfc3339()),
            completed_at: job.completed_at().map(|timestamp| timestamp.to_rfc3339()),
            last_heartbeat_at: job.last_heartbeat_at().map(|timestamp| timestamp.to_rfc3339()),
            error_message: job.error_message().map(ToOwned::to_owned),
            findings_count,
        }
    }
}

impl From<AuditFinding> for FindingResponse {
    fn from(value: AuditFinding) -> Self {
        Self {
            id: value.id,
            resource_id: value.resource_id,
            resource_type: value.resource_type,
            check_type: value.check_type.as_str().to_owned(),
            severity: value.severity.as_str().to_owned(),
            description: value.description,
            recommendation: value.recommendation,
            metadata: value.metadata,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

impl From<AuditJobStats> for JobCountsResponse {
    fn from(value: AuditJobStats) -> Self {
        Self {
            total_jobs: value.total_jobs(),
            pending_jobs: value.pending_jobs,
            running_jobs: value.running_jobs,
            completed_jobs: value.completed_jobs,
            failed_jobs: value.failed_jobs,
        }
    }
}

impl From<FindingSeverityCounts> for SeverityCountsResponse {
    fn from(value: FindingSeverityCounts) -> Self {
        Self {
            total_findings: value.total(),
            info_findings: value.info,
            low_findings: value.low,
            medium_findings: value.medium,
            high_findings: value.high,
            critical_findings: value.critical,
        }
    }
}

impl From<QueueDepth> for QueueDepthResponse {
    fn from(value: QueueDepth) -> Self {
        Self {
            ready: value.ready,
            in_flight: value.in_flight,
        }
    }
}
