use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming payload for audit submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAuditRequest {
    pub job_id: Option<String>,
    pub cloud_provider: String,
    pub subscription_id: Option<String>,
    pub account_id: Option<String>,
    pub project_id: Option<String>,
    pub credentials_ref: Option<String>,
    pub checks: Option<Vec<String>>,
    pub priority: Option<String>,
}

/// Accepted audit submission.
#[derive(Debug, Serialize)]
pub struct SubmitAuditResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
    pub queue_position: Option<i64>,
}

/// API representation of one audit job.
#[derive(Debug, Serialize)]
pub struct AuditJobResponse {
    pub job_id: String,
    pub status: String,
    pub cloud_provider: String,
    pub subscription_id: Option<String>,
    pub account_id: Option<String>,
    pub project_id: Option<String>,
    pub checks: Vec<String>,
    pub priority: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub last_heartbeat_at: Option<String>,
    pub error_message: Option<String>,
    pub findings_count: u64,
}

/// Query string accepted by the findings listing.
#[derive(Debug, Default, Deserialize)]
pub struct FindingsQuery {
    pub severity: Option<String>,
    pub after: Option<String>,
    pub limit: Option<usize>,
}

/// API representation of one finding.
#[derive(Debug, Serialize)]
pub struct FindingResponse {
    pub id: i64,
    pub resource_id: String,
    pub resource_type: String,
    pub check_type: String,
    pub severity: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub metadata: Value,
    pub created_at: String,
}

/// One page of findings.
#[derive(Debug, Serialize)]
pub struct FindingsPageResponse {
    pub job_id: String,
    pub findings: Vec<FindingResponse>,
    pub next_cursor: Option<String>,
}

/// Job counters per status.
#[derive(Debug, Serialize)]
pub struct JobCountsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub running_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
}

/// Finding counters per severity.
#[derive(Debug, Serialize)]
pub struct SeverityCountsResponse {
    pub total_findings: i64,
    pub info_findings: i64,
    pub low_findings: i64,
    pub medium_findings: i64,
    pub high_findings: i64,
    pub critical_findings: i64,
}

/// Queue transport counters.
#[derive(Debug, Serialize)]
pub struct QueueDepthResponse {
    pub ready: i64,
    pub in_flight: i64,
}

/// Operational metrics snapshot.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub jobs: JobCountsResponse,
    pub findings: SeverityCountsResponse,
    pub queue: Option<QueueDepthResponse>,
    pub uptime_seconds: u64,
}
