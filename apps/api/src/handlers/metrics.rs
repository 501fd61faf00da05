use axum::Json;
use axum::extract::State;

use crate::dto::{MetricsResponse, QueueDepthResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> ApiResult<Json<MetricsResponse>> {
    let overview = state.audit_service.overview().await?;

    Ok(Json(MetricsResponse {
        jobs: overview.jobs.into(),
        findings: overview.findings.into(),
        queue: overview.queue.map(QueueDepthResponse::from),
        uptime_seconds: state.uptime_seconds(),
    }))
}
