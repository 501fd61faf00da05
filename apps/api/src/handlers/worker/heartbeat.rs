use super::*;

pub async fn heartbeat_job_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<WorkerJobStatusResponse>> {
    let job_id = JobId::new(job_id)?;
    let job = state.audit_service.on_worker_heartbeat(&job_id).await?;
    debug!(worker_id = %worker.worker_id(), job_id = %job_id, "audit job heartbeat");

    Ok(Json(status_response(&job)))
}
