use super::*;

pub async fn start_job_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StartOutcome>> {
    let job_id = JobId::new(job_id)?;
    let outcome = state
        .audit_service
        .mark_running(&job_id, worker.worker_id())
        .await?;

    match outcome {
        StartOutcome::Started => info!(
            worker_id = %worker.worker_id(),
            job_id = %job_id,
            "worker started audit job"
        ),
        StartOutcome::AlreadyClaimed { status } => debug!(
            worker_id = %worker.worker_id(),
            job_id = %job_id,
            status = status.as_str(),
            "worker lost start race"
        ),
    }

    Ok(Json(outcome))
}
