use std::time::Duration;

use async_trait::async_trait;
use auditor_application::{AuditTask, AuditTaskQueue, QueueDepth, TaskDelivery};
use auditor_core::{AppError, AppResult};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tokio::time::Instant;

const DEFAULT_POLL_STEP: Duration = Duration::from_millis(250);

/// PostgreSQL-backed leased task queue.
///
/// Delivery claims rows with `FOR UPDATE SKIP LOCKED`; a lease that expires makes the
/// row claimable again with a fresh lease token.
#[derive(Clone)]
pub struct PostgresAuditTaskQueue {
    pool: PgPool,
    poll_step: Duration,
}

impl PostgresAuditTaskQueue {
    /// Creates a queue with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            poll_step: DEFAULT_POLL_STEP,
        }
    }

    /// Overrides the interval between claim attempts while waiting for work.
    #[must_use]
    pub fn with_poll_step(mut self, poll_step: Duration) -> Self {
        self.poll_step = poll_step.max(Duration::from_millis(10));
        self
    }

    async fn try_claim(
        &self,
        consumer_id: &str,
        visibility_timeout: Duration,
    ) -> AppResult<Option<TaskDelivery>> {
        let row = sqlx::query_as::<_, ClaimedTaskRow>(
            r#"
            WITH candidate_task AS (
                SELECT id
                FROM audit_task_queue
                WHERE status = 'ready'
                   OR (status = 'leased' AND lease_expires_at < now())
                ORDER BY priority_rank DESC, created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE audit_task_queue tasks
            SET
                status = 'leased',
                leased_by = $1,
                lease_token = gen_random_uuid()::TEXT,
                lease_expires_at = now() + make_interval(secs => $2::DOUBLE PRECISION),
                delivery_count = tasks.delivery_count + 1,
                updated_at = now()
            FROM candidate_task
            WHERE tasks.id = candidate_task.id
            RETURNING tasks.id, tasks.lease_token, tasks.delivery_count, tasks.payload
            "#,
        )
        .bind(consumer_id)
        .bind(visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to claim audit task for consumer '{consumer_id}': {error}"
            ))
        })?;

        row.map(task_delivery_from_row).transpose()
    }
}

#[derive(Debug, FromRow)]
struct ClaimedTaskRow {
    id: i64,
    lease_token: String,
    delivery_count: i32,
    payload: Value,
}

#[derive(Debug, FromRow)]
struct QueueDepthRow {
    ready: i64,
    in_flight: i64,
}

#[async_trait]
impl AuditTaskQueue for PostgresAuditTaskQueue {
    async fn enqueue(&self, task: AuditTask) -> AppResult<String> {
        let payload = serde_json::to_value(&task).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize audit task '{}': {error}",
                task.job_id
            ))
        })?;

        let task_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO audit_task_queue (job_id, priority_rank, payload, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(task.job_id.as_str())
        .bind(task.priority.rank())
        .bind(payload)
        .bind(task.enqueued_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to enqueue audit task '{}': {error}",
                task.job_id
            ))
        })?;

        Ok(task_id.to_string())
    }

    async fn dequeue(
        &self,
        consumer_id: &str,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> AppResult<Option<TaskDelivery>> {
        if visibility_timeout.is_zero() {
            return Err(AppError::Validation(
                "visibility_timeout must be greater than zero".to_owned(),
            ));
        }

        let deadline = Instant::now() + wait;
        loop {
            if let Some(delivery) = self.try_claim(consumer_id, visibility_timeout).await? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            tokio::time::sleep(self.poll_step.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let task_id = parse_task_id(delivery.task_id.as_str())?;

        sqlx::query(
            r#"
            DELETE FROM audit_task_queue
            WHERE id = $1
              AND lease_token = $2
            "#,
        )
        .bind(task_id)
        .bind(delivery.receipt.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to acknowledge audit task '{}': {error}",
                delivery.task_id
            ))
        })?;

        Ok(())
    }

    async fn nack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let task_id = parse_task_id(delivery.task_id.as_str())?;

        let result = sqlx::query(
            r#"
            UPDATE audit_task_queue
            SET
                status = 'ready',
                leased_by = NULL,
                lease_token = NULL,
                lease_expires_at = NULL,
                updated_at = now()
            WHERE id = $1
              AND lease_token = $2
              AND status = 'leased'
            "#,
        )
        .bind(task_id)
        .bind(delivery.receipt.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to return audit task '{}' to the queue: {error}",
                delivery.task_id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "audit task '{}' is not currently leased with matching receipt",
                delivery.task_id
            )));
        }

        Ok(())
    }

    async fn extend_visibility(
        &self,
        delivery: &TaskDelivery,
        visibility_timeout: Duration,
    ) -> AppResult<bool> {
        let task_id = parse_task_id(delivery.task_id.as_str())?;

        let result = sqlx::query(
            r#"
            UPDATE audit_task_queue
            SET
                lease_expires_at = now() + make_interval(secs => $3::DOUBLE PRECISION),
                updated_at = now()
            WHERE id = $1
              AND lease_token = $2
              AND status = 'leased'
            "#,
        )
        .bind(task_id)
        .bind(delivery.receipt.as_str())
        .bind(visibility_timeout.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to extend audit task '{}' visibility: {error}",
                delivery.task_id
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let row = sqlx::query_as::<_, QueueDepthRow>(
            r#"
            SELECT
                COUNT(*) FILTER (
                    WHERE status = 'ready'
                       OR (status = 'leased' AND lease_expires_at < now())
                )::BIGINT AS ready,
                COUNT(*) FILTER (
                    WHERE status = 'leased' AND lease_expires_at >= now()
                )::BIGINT AS in_flight
            FROM audit_task_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read audit queue depth: {error}")))?;

        Ok(QueueDepth {
            ready: row.ready,
            in_flight: row.in_flight,
        })
    }
}

fn parse_task_id(task_id: &str) -> AppResult<i64> {
    task_id
        .parse::<i64>()
        .map_err(|error| AppError::Validation(format!("invalid audit task id '{task_id}': {error}")))
}

fn task_delivery_from_row(row: ClaimedTaskRow) -> AppResult<TaskDelivery> {
    let task = serde_json::from_value::<AuditTask>(row.payload).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode audit task payload for task '{}': {error}",
            row.id
        ))
    })?;
    let delivery_count = u32::try_from(row.delivery_count).map_err(|error| {
        AppError::Internal(format!(
            "invalid delivery_count for audit task '{}': {error}",
            row.id
        ))
    })?;

    Ok(TaskDelivery {
        task_id: row.id.to_string(),
        receipt: row.lease_token,
        delivery_count,
        task,
    })
}

#[cfg(test)]
mod tests;
