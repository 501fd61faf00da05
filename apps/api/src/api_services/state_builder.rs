use std::sync::Arc;
use std::time::Instant;

use auditor_application::{AuditService, AuditTaskQueue, CheckCatalog};
use auditor_core::AppError;
use auditor_infrastructure::{PostgresAuditRepository, builtin_check_descriptors};
use sqlx::PgPool;
use tracing::info;

use crate::api_config::{ApiConfig, QueueBackend};
use crate::state::AppState;

mod coordination;
mod queue;

use coordination::{build_event_publisher, build_reaper_lease_coordinator};
pub use queue::build_task_queue;

pub fn build_app_state(
    pool: PgPool,
    config: &ApiConfig,
    redis_client: Option<redis::Client>,
    task_queue: Arc<dyn AuditTaskQueue>,
) -> Result<AppState, AppError> {
    let repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let check_catalog = CheckCatalog::new(builtin_check_descriptors()?)?;

    let mut audit_service = AuditService::new(
        repository.clone(),
        repository,
        task_queue,
        check_catalog,
    )
    .with_liveness_window(config.liveness_window);

    if let Some(publisher) = build_event_publisher(config, redis_client.as_ref()) {
        audit_service = audit_service.with_event_publisher(publisher);
    }

    if let Some(coordinator) = build_reaper_lease_coordinator(redis_client.as_ref()) {
        audit_service = audit_service.with_reaper_lease(
            coordinator,
            config.instance_id.clone(),
            config.reaper_lease_seconds(),
        );
    }

    info!(
        queue_backend = config.queue_backend.as_str(),
        events_enabled = config.events_enabled,
        reaper_lease = redis_client.is_some(),
        embedded_worker = config.queue_backend == QueueBackend::Memory,
        "audit service configured"
    );

    Ok(AppState {
        audit_service,
        postgres_pool: pool,
        redis_required: config.redis_required(),
        redis_client,
        worker_shared_secret: config.worker_shared_secret.clone(),
        started_at: Instant::now(),
    })
}
