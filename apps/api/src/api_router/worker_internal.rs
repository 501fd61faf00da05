use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::state::AppState;
use crate::{handlers, middleware};

pub(super) fn build_worker_internal_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/internal/worker/jobs/{job_id}",
            get(handlers::worker::worker_job_status_handler),
        )
        .route(
            "/api/internal/worker/jobs/{job_id}/start",
            post(handlers::worker::start_job_handler),
        )
        .route(
            "/api/internal/worker/jobs/{job_id}/heartbeat",
            post(handlers::worker::heartbeat_job_handler),
        )
        .route(
            "/api/internal/worker/jobs/{job_id}/complete",
            post(handlers::worker::complete_job_handler),
        )
        .route_layer(from_fn_with_state(
            app_state,
            middleware::require_worker_auth,
        ))
}
