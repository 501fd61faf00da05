use std::sync::Arc;
use std::time::Instant;

use auditor_application::{AuditService, AuditTaskQueue, CheckCatalog};
use auditor_infrastructure::{
    InMemoryAuditRepository, InMemoryAuditTaskQueue, builtin_check_descriptors,
};
use axum::body::to_bytes;
use axum::response::Response;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;

use crate::middleware::WorkerIdentity;
use crate::state::AppState;

pub(crate) struct TestHarness {
    pub state: AppState,
    pub repository: Arc<InMemoryAuditRepository>,
}

pub(crate) fn harness() -> TestHarness {
    harness_with_queue(Arc::new(InMemoryAuditTaskQueue::new()))
}

pub(crate) fn harness_with_queue(task_queue: Arc<dyn AuditTaskQueue>) -> TestHarness {
    let repository = Arc::new(InMemoryAuditRepository::new());
    let descriptors = builtin_check_descriptors()
        .unwrap_or_else(|error| panic!("built-in descriptors should be valid: {error}"));
    let catalog = CheckCatalog::new(descriptors)
        .unwrap_or_else(|error| panic!("built-in catalog should be valid: {error}"));
    let audit_service = AuditService::new(
        repository.clone(),
        repository.clone(),
        task_queue,
        catalog,
    );
    let postgres_pool = PgPoolOptions::new()
        .connect_lazy("postgres://auditor@127.0.0.1:1/auditor")
        .unwrap_or_else(|error| panic!("lazy pool should build: {error}"));

    TestHarness {
        state: AppState {
            audit_service,
            postgres_pool,
            redis_client: None,
            redis_required: false,
            worker_shared_secret: "0123456789abcdef-secret".to_owned(),
            started_at: Instant::now(),
        },
        repository,
    }
}

pub(crate) fn worker_identity() -> WorkerIdentity {
    WorkerIdentity::for_tests("worker-test")
}

pub(crate) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|error| panic!("response body should be readable: {error}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|error| panic!("response body should be JSON: {error}"))
}
