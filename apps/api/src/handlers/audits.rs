use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use auditor_application::{DEFAULT_FINDINGS_PAGE_SIZE, FindingCursor, FindingListQuery};
use auditor_core::{AppError, JobId};
use auditor_domain::Severity;

use crate::dto::{
    AuditJobResponse, FindingResponse, FindingsPageResponse, FindingsQuery, SubmitAuditRequest,
    SubmitAuditResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn submit_audit_handler(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAuditRequest>,
) -> ApiResult<(StatusCode, Json<SubmitAuditResponse>)> {
    let outcome = state.audit_service.submit(payload.into()).await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitAuditResponse::from(outcome))))
}

pub async fn get_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AuditJobResponse>> {
    let job_id = JobId::new(job_id)?;
    let (job, findings_count) = state.audit_service.job_summary(&job_id).await?;

    Ok(Json(AuditJobResponse::from_job(&job, findings_count)))
}

pub async fn list_findings_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<FindingsQuery>,
) -> ApiResult<Json<FindingsPageResponse>> {
    let job_id = JobId::new(job_id)?;
    let list_query = finding_list_query(job_id.clone(), query)?;
    let page = state.audit_service.list_findings(list_query).await?;

    Ok(Json(FindingsPageResponse {
        job_id: job_id.to_string(),
        findings: page.findings.into_iter().map(FindingResponse::from).collect(),
        next_cursor: page.next_cursor.map(|cursor| cursor.to_string()),
    }))
}

fn finding_list_query(job_id: JobId, query: FindingsQuery) -> Result<FindingListQuery, AppError> {
    let severity = query
        .severity
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Severity::parse)
        .transpose()?;
    let after = query
        .after
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(FindingCursor::parse)
        .transpose()?;

    Ok(FindingListQuery {
        job_id,
        severity,
        after,
        limit: query.limit.unwrap_or(DEFAULT_FINDINGS_PAGE_SIZE),
    })
}
