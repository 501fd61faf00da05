use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::{
    complete_job_handler, heartbeat_job_handler, start_job_handler, worker_job_status_handler,
};
use crate::dto::{SubmitAuditRequest, WorkerCompleteRequest};
use crate::handlers::audits::submit_audit_handler;
use crate::handlers::test_support::{TestHarness, harness, json_body, worker_identity};
use crate::middleware::WorkerIdentity;

async fn submitted(job_id: &str) -> TestHarness {
    let harness = harness();
    let response = submit_audit_handler(
        State(harness.state.clone()),
        Json(SubmitAuditRequest {
            job_id: Some(job_id.to_owned()),
            cloud_provider: "aws".to_owned(),
            account_id: Some("123456789012".to_owned()),
            ..SubmitAuditRequest::default()
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    harness
}

#[tokio::test]
async fn first_start_wins_and_owner_may_repeat_it() {
    let harness = submitted("race-1").await;

    let first = start_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("race-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["outcome"], "started");

    let second = start_job_handler(
        State(harness.state.clone()),
        Extension(WorkerIdentity::for_tests("worker-other")),
        Path("race-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(second.status(), StatusCode::OK);
    let second = json_body(second).await;
    assert_eq!(second["outcome"], "already_claimed");
    assert_eq!(second["status"], "running");

    let repeated = start_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("race-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(repeated.status(), StatusCode::OK);
    assert_eq!(json_body(repeated).await["outcome"], "started");

    let status = worker_job_status_handler(
        State(harness.state),
        Extension(worker_identity()),
        Path("race-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(json_body(status).await["status"], "running");
}

#[tokio::test]
async fn heartbeat_requires_a_running_job() {
    let harness = submitted("beat-1").await;

    let pending = heartbeat_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("beat-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(pending.status(), StatusCode::CONFLICT);

    let started = start_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("beat-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(started.status(), StatusCode::OK);

    let running = heartbeat_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("beat-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(running.status(), StatusCode::OK);
    let body = json_body(running).await;
    assert!(body["last_heartbeat_at"].is_string());

    let missing = heartbeat_job_handler(
        State(harness.state),
        Extension(worker_identity()),
        Path("beat-missing".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failure_without_reason_uses_default_message_and_is_final() {
    let harness = submitted("done-1").await;

    let started = start_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("done-1".to_owned()),
    )
    .await
    .into_response();
    assert_eq!(started.status(), StatusCode::OK);

    let failed = complete_job_handler(
        State(harness.state.clone()),
        Extension(worker_identity()),
        Path("done-1".to_owned()),
        Json(WorkerCompleteRequest {
            success: false,
            error_message: Some("   ".to_owned()),
        }),
    )
    .await
    .into_response();
    assert_eq!(failed.status(), StatusCode::OK);
    assert_eq!(json_body(failed).await["status"], "failed");

    let job = harness
        .state
        .audit_service
        .get_status(
            &auditor_core::JobId::new("done-1").unwrap_or_else(|error| panic!("{error}")),
        )
        .await
        .unwrap_or_else(|error| panic!("job should exist: {error}"));
    assert_eq!(job.error_message(), Some("worker reported failure"));
    assert!(job.completed_at().is_some());

    let again = complete_job_handler(
        State(harness.state),
        Extension(worker_identity()),
        Path("done-1".to_owned()),
        Json(WorkerCompleteRequest {
            success: true,
            error_message: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}
