//! In-process worker used with the process-local queue.

use std::sync::Arc;

use auditor_application::{
    AuditFindingRepository, AuditService, AuditTaskQueue, AuditWorkerRuntime, ResourceInventory,
    WorkerRuntimeConfig,
};
use auditor_core::AppResult;
use auditor_infrastructure::{JsonResourceInventory, builtin_check_registry};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Loads the resource inventory, falling back to an empty one.
pub fn load_inventory(inventory_path: Option<&str>) -> AppResult<Arc<dyn ResourceInventory>> {
    match inventory_path {
        Some(path) => {
            let inventory = JsonResourceInventory::from_path(path)?;
            info!(path, accounts = inventory.account_count(), "resource inventory loaded");
            Ok(Arc::new(inventory))
        }
        None => Ok(Arc::new(JsonResourceInventory::empty())),
    }
}

/// Builds a worker runtime sharing the orchestrator's queue and store.
///
/// Job transitions go straight to the service instead of the internal HTTP API.
pub fn build_embedded_worker(
    audit_service: AuditService,
    task_queue: Arc<dyn AuditTaskQueue>,
    finding_repository: Arc<dyn AuditFindingRepository>,
    inventory: Arc<dyn ResourceInventory>,
    worker_id: String,
) -> AppResult<AuditWorkerRuntime> {
    AuditWorkerRuntime::new(
        WorkerRuntimeConfig::new(worker_id),
        task_queue,
        Arc::new(audit_service),
        finding_repository,
        builtin_check_registry(inventory)?,
    )
}

/// Polls the queue until the task is aborted.
pub fn spawn_embedded_worker(runtime: AuditWorkerRuntime) -> JoinHandle<()> {
    tokio::spawn(async move {
        let worker_id = runtime.config().worker_id.clone();
        info!(worker_id = %worker_id, "embedded audit worker started");

        loop {
            match runtime.poll_once().await {
                Ok(Some(outcome)) => info!(
                    worker_id = %worker_id,
                    outcome = outcome.as_str(),
                    "audit task processed"
                ),
                Ok(None) => {}
                Err(error) => {
                    warn!(worker_id = %worker_id, error = %error, "audit task poll failed");
                    tokio::time::sleep(runtime.config().poll_wait).await;
                }
            }
        }
    })
}
