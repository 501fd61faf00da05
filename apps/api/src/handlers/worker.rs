use axum::Json;
use axum::extract::{Extension, Path, State};

use auditor_application::StartOutcome;
use auditor_core::JobId;
use auditor_domain::AuditJob;
use tracing::{debug, info};

use crate::dto::{WorkerCompleteRequest, WorkerJobStatusResponse};
use crate::error::ApiResult;
use crate::middleware::WorkerIdentity;
use crate::state::AppState;

mod complete;
mod heartbeat;
mod start;
mod status;

pub use complete::complete_job_handler;
pub use heartbeat::heartbeat_job_handler;
pub use start::start_job_handler;
pub use status::worker_job_status_handler;

fn status_response(job: &AuditJob) -> WorkerJobStatusResponse {
    WorkerJobStatusResponse {
        job_id: job.job_id().to_string(),
        status: job.status().as_str().to_owned(),
        last_heartbeat_at: job.last_heartbeat_at().map(|timestamp| timestamp.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests;
