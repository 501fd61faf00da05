use axum::Router;
use axum::routing::{get, post};
use auditor_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

mod cors;
mod worker_internal;

use cors::build_cors_layer;
use worker_internal::build_worker_internal_routes;

pub fn build_router(app_state: AppState, frontend_url: Option<&str>) -> Result<Router, AppError> {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/audits", post(handlers::audits::submit_audit_handler))
        .route("/api/jobs/{job_id}", get(handlers::audits::get_job_handler))
        .route(
            "/api/jobs/{job_id}/findings",
            get(handlers::audits::list_findings_handler),
        )
        .route("/api/metrics", get(handlers::metrics::metrics_handler));

    Ok(Router::new()
        .merge(public_routes)
        .merge(build_worker_internal_routes(app_state.clone()))
        .layer(build_cors_layer(frontend_url)?)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
