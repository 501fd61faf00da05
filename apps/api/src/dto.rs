mod audits;
mod health;
mod worker;

pub use audits::{
    AuditJobResponse, FindingResponse, FindingsPageResponse, FindingsQuery, JobCountsResponse,
    MetricsResponse, QueueDepthResponse, SeverityCountsResponse, SubmitAuditRequest,
    SubmitAuditResponse,
};
pub use health::{HealthDependencyStatus, HealthResponse};
pub use worker::{WorkerCompleteRequest, WorkerJobStatusResponse};
