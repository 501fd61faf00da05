//! Cloud auditor worker runtime.

#![forbid(unsafe_code)]

mod worker_config;

use std::sync::Arc;
use std::time::Duration;

use auditor_application::{AuditTaskQueue, AuditWorkerRuntime, ResourceInventory};
use auditor_core::{AppError, AppResult};
use auditor_infrastructure::{
    HttpJobControl, JsonResourceInventory, PostgresAuditRepository, PostgresAuditTaskQueue,
    RedisAuditTaskQueue, builtin_check_registry,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::worker_config::{WorkerConfig, WorkerQueueBackend};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let task_queue = build_task_queue(&config, pool.clone())?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let job_control = HttpJobControl::new(
        http_client,
        config.api_base_url.as_str(),
        config.worker_shared_secret.as_str(),
        config.worker_id.as_str(),
    );

    let runtime = AuditWorkerRuntime::new(
        config.runtime_config(),
        task_queue,
        Arc::new(job_control),
        Arc::new(PostgresAuditRepository::new(pool)),
        builtin_check_registry(load_inventory(config.inventory_path.as_deref())?)?,
    )?;

    info!(
        worker_id = %config.worker_id,
        api_base_url = %config.api_base_url,
        queue_backend = config.queue_backend.as_str(),
        poll_interval_ms = config.poll_interval.as_millis(),
        visibility_timeout_seconds = config.visibility_timeout.as_secs(),
        "auditor-worker started"
    );

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_sender.send(true);
    });

    run_until_shutdown(&runtime, shutdown_receiver).await;

    info!(worker_id = %config.worker_id, "auditor-worker stopped");
    Ok(())
}

async fn run_until_shutdown(runtime: &AuditWorkerRuntime, mut shutdown: watch::Receiver<bool>) {
    let worker_id = runtime.config().worker_id.clone();

    while !*shutdown.borrow() {
        match runtime.poll_once().await {
            Ok(Some(outcome)) => info!(
                worker_id = %worker_id,
                outcome = outcome.as_str(),
                "audit task processed"
            ),
            Ok(None) => {}
            Err(error) => {
                warn!(worker_id = %worker_id, error = %error, "failed to poll audit task queue");
                tokio::select! {
                    _ = tokio::time::sleep(runtime.config().poll_wait) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_task_queue(config: &WorkerConfig, pool: PgPool) -> AppResult<Arc<dyn AuditTaskQueue>> {
    match config.queue_backend {
        WorkerQueueBackend::Postgres => Ok(Arc::new(PostgresAuditTaskQueue::new(pool))),
        WorkerQueueBackend::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Validation("REDIS_URL is required when QUEUE_BACKEND=redis".to_owned())
            })?;
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

            Ok(Arc::new(RedisAuditTaskQueue::new(
                client,
                config.queue_key_prefix.clone(),
            )))
        }
    }
}

fn load_inventory(inventory_path: Option<&str>) -> AppResult<Arc<dyn ResourceInventory>> {
    let Some(path) = inventory_path else {
        warn!("AUDIT_INVENTORY_PATH is not set; every account will be reported unreachable");
        return Ok(Arc::new(JsonResourceInventory::empty()));
    };

    let inventory = JsonResourceInventory::from_path(path)?;
    info!(path, accounts = inventory.account_count(), "resource inventory loaded");
    Ok(Arc::new(inventory))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown requested, finishing current audit job");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
