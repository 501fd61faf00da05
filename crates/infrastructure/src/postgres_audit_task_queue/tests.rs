use std::time::Duration;

use auditor_application::{AuditTask, AuditTaskQueue};
use auditor_core::{AppError, JobId};
use auditor_domain::{AccountTarget, CheckName, JobPriority};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresAuditTaskQueue;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit queue tests: {error}");
    }

    Some(pool)
}

fn task(job_id: &str, priority: JobPriority) -> AuditTask {
    AuditTask {
        job_id: JobId::new(job_id).unwrap_or_else(|error| panic!("{error}")),
        target: AccountTarget::Gcp {
            project_id: "proj-1".to_owned(),
        },
        credentials_ref: None,
        checks: vec![CheckName::new("open-ports").unwrap_or_else(|error| panic!("{error}"))],
        priority,
        enqueued_at: Utc::now(),
    }
}

#[tokio::test]
async fn leased_queue_delivers_by_priority_and_fences_receipts() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let cleared = sqlx::query("DELETE FROM audit_task_queue")
        .execute(&pool)
        .await;
    assert!(cleared.is_ok());

    let queue = PostgresAuditTaskQueue::new(pool).with_poll_step(Duration::from_millis(20));
    let visibility = Duration::from_secs(30);
    let no_wait = Duration::from_millis(0);

    for (job_id, priority) in [
        ("pg-low", JobPriority::Low),
        ("pg-high", JobPriority::High),
        ("pg-medium", JobPriority::Medium),
    ] {
        let enqueued = queue.enqueue(task(job_id, priority)).await;
        assert!(enqueued.is_ok());
    }

    let depth = queue
        .depth()
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(depth.ready, 3);

    let high = queue
        .dequeue("consumer-a", visibility, no_wait)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("a task should be ready"));
    assert_eq!(high.task.job_id.as_str(), "pg-high");
    assert_eq!(high.delivery_count, 1);

    let medium = queue
        .dequeue("consumer-b", visibility, no_wait)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("a task should be ready"));
    assert_eq!(medium.task.job_id.as_str(), "pg-medium");

    let mut stale = medium.clone();
    stale.receipt = "not-the-receipt".to_owned();
    assert!(matches!(queue.nack(&stale).await, Err(AppError::Conflict(_))));
    assert!(matches!(
        queue.extend_visibility(&stale, visibility).await,
        Ok(false)
    ));
    assert!(matches!(
        queue.extend_visibility(&medium, visibility).await,
        Ok(true)
    ));

    assert!(queue.nack(&medium).await.is_ok());
    let redelivered = queue
        .dequeue("consumer-c", visibility, no_wait)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("nacked task should be ready"));
    assert_eq!(redelivered.task.job_id.as_str(), "pg-medium");
    assert_eq!(redelivered.delivery_count, 2);
    assert_ne!(redelivered.receipt, medium.receipt);

    assert!(queue.ack(&high).await.is_ok());
    assert!(queue.ack(&redelivered).await.is_ok());

    let low = queue
        .dequeue("consumer-a", Duration::from_millis(200), no_wait)
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("low task should be ready"));
    assert_eq!(low.task.job_id.as_str(), "pg-low");

    tokio::time::sleep(Duration::from_millis(400)).await;
    let expired = queue
        .dequeue("consumer-b", visibility, Duration::from_millis(100))
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("expired lease should be redelivered"));
    assert_eq!(expired.task.job_id.as_str(), "pg-low");
    assert_eq!(expired.delivery_count, 2);

    assert!(queue.ack(&expired).await.is_ok());
    let empty = queue
        .dequeue("consumer-a", visibility, Duration::from_millis(50))
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(empty.is_none());
}
