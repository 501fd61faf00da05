use super::*;

pub async fn complete_job_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Path(job_id): Path<String>,
    Json(payload): Json<WorkerCompleteRequest>,
) -> ApiResult<Json<WorkerJobStatusResponse>> {
    let job_id = JobId::new(job_id)?;
    let job = state
        .audit_service
        .on_worker_complete(&job_id, payload.success, payload.error_message)
        .await?;
    info!(
        worker_id = %worker.worker_id(),
        job_id = %job_id,
        status = job.status().as_str(),
        "worker reported audit job outcome"
    );

    Ok(Json(status_response(&job)))
}
