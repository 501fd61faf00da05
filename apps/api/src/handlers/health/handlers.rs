use super::checks::{check_postgres, check_redis};
use super::*;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = check_postgres(state.postgres_pool.clone()).await;
    let redis = check_redis(state.redis_client.clone(), state.redis_required).await;

    let ready = is_ready(postgres.status, redis.status, state.redis_required);
    let (status, http_status) = if ready {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            postgres,
            redis,
            uptime_seconds: state.uptime_seconds(),
        }),
    )
}

fn is_ready(postgres_status: &str, redis_status: &str, redis_required: bool) -> bool {
    postgres_status == "ok" && (redis_status == "ok" || !redis_required)
}
