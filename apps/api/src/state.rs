use std::time::Instant;

use auditor_application::AuditService;
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub audit_service: AuditService,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
    pub redis_required: bool,
    pub worker_shared_secret: String,
    pub started_at: Instant,
}

impl AppState {
    /// Seconds elapsed since the process started serving.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
