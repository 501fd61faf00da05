use serde::{Deserialize, Serialize};

/// Job status as seen by a worker.
#[derive(Debug, Serialize)]
pub struct WorkerJobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub last_heartbeat_at: Option<String>,
}

/// Terminal outcome reported by a worker.
#[derive(Debug, Deserialize)]
pub struct WorkerCompleteRequest {
    pub success: bool,
    pub error_message: Option<String>,
}
