use std::sync::Arc;

use auditor_application::AuditTaskQueue;
use auditor_core::AppError;
use auditor_infrastructure::{
    InMemoryAuditTaskQueue, PostgresAuditTaskQueue, RedisAuditTaskQueue,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, QueueBackend};

pub fn build_task_queue(
    config: &ApiConfig,
    pool: &PgPool,
    redis_client: Option<&redis::Client>,
) -> Result<Arc<dyn AuditTaskQueue>, AppError> {
    match config.queue_backend {
        QueueBackend::Postgres => Ok(Arc::new(PostgresAuditTaskQueue::new(pool.clone()))),
        QueueBackend::Redis => {
            let redis_client = redis_client.cloned().ok_or_else(|| {
                AppError::Validation("REDIS_URL is required when QUEUE_BACKEND=redis".to_owned())
            })?;

            Ok(Arc::new(RedisAuditTaskQueue::new(
                redis_client,
                config.queue_key_prefix.clone(),
            )))
        }
        QueueBackend::Memory => Ok(Arc::new(InMemoryAuditTaskQueue::new())),
    }
}
