use super::*;

pub async fn worker_job_status_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<WorkerJobStatusResponse>> {
    let job_id = JobId::new(job_id)?;
    let job = state.audit_service.get_status(&job_id).await?;
    debug!(
        worker_id = %worker.worker_id(),
        job_id = %job_id,
        status = job.status().as_str(),
        "worker looked up audit job status"
    );

    Ok(Json(status_response(&job)))
}
