//! Cloud auditor orchestrator API.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod embedded_worker;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use auditor_core::AppError;
use auditor_infrastructure::PostgresAuditRepository;
use tracing::info;

use crate::api_config::{ApiConfig, QueueBackend, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{
    build_app_state, build_redis_client, build_task_queue, connect_and_migrate,
    spawn_stall_reaper,
};
use crate::embedded_worker::{build_embedded_worker, load_inventory, spawn_embedded_worker};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str()).await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;
    let task_queue = build_task_queue(&config, &pool, redis_client.as_ref())?;
    let app_state = build_app_state(pool.clone(), &config, redis_client, task_queue.clone())?;

    let reaper = spawn_stall_reaper(app_state.audit_service.clone(), config.reaper_interval);
    let embedded_worker = if config.queue_backend == QueueBackend::Memory {
        let runtime = build_embedded_worker(
            app_state.audit_service.clone(),
            task_queue,
            Arc::new(PostgresAuditRepository::new(pool)),
            load_inventory(config.inventory_path.as_deref())?,
            format!("{}-embedded", config.instance_id),
        )?;
        Some(spawn_embedded_worker(runtime))
    } else {
        None
    };

    let app = build_router(app_state, config.frontend_url.as_deref())?;
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(
        %address,
        queue_backend = config.queue_backend.as_str(),
        instance_id = %config.instance_id,
        "auditor-api listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")));

    reaper.abort();
    if let Some(embedded_worker) = embedded_worker {
        embedded_worker.abort();
    }

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "failed to listen for ctrl-c");
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
                tracing::warn!(error = %error, "failed to listen for SIGTERM");
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

    info!("shutdown signal received");
}
