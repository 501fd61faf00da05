mod conversions;
mod types;

pub use types::{
    AuditJobResponse, FindingResponse, FindingsPageResponse, FindingsQuery, JobCountsResponse,
    MetricsResponse, QueueDepthResponse, SeverityCountsResponse, SubmitAuditRequest,
    SubmitAuditResponse,
};
