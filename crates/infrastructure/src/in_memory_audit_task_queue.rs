use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use auditor_application::{AuditTask, AuditTaskQueue, QueueDepth, TaskDelivery};
use auditor_core::{AppError, AppResult};
use auditor_domain::JobPriority;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

const WAKE_UP_STEP: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct StoredTask {
    task: AuditTask,
    delivery_count: u32,
    lease: Option<TaskLease>,
}

#[derive(Debug)]
struct TaskLease {
    receipt: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    last_task_id: u64,
    ready: [VecDeque<u64>; 3],
    tasks: HashMap<u64, StoredTask>,
}

impl QueueState {
    fn requeue_expired(&mut self, now: Instant) {
        let mut expired = self
            .tasks
            .iter()
            .filter(|(_, stored)| {
                stored
                    .lease
                    .as_ref()
                    .is_some_and(|lease| lease.expires_at <= now)
            })
            .map(|(task_id, stored)| (*task_id, stored.task.priority))
            .collect::<Vec<_>>();
        expired.sort_unstable_by_key(|(task_id, _)| std::cmp::Reverse(*task_id));

        for (task_id, priority) in expired {
            if let Some(stored) = self.tasks.get_mut(&task_id) {
                stored.lease = None;
            }
            self.ready[lane_index(priority)].push_front(task_id);
        }
    }

    fn held_mut(&mut self, delivery: &TaskDelivery) -> Option<(u64, &mut StoredTask)> {
        let task_id = delivery.task_id.parse::<u64>().ok()?;
        let stored = self.tasks.get_mut(&task_id)?;
        let held = stored
            .lease
            .as_ref()
            .is_some_and(|lease| lease.receipt == delivery.receipt);

        held.then_some((task_id, stored))
    }
}

/// Process-local audit task queue with visibility timeouts.
///
/// Expired deliveries return to the front of their priority lane the next time a
/// consumer polls, matching the Redis and PostgreSQL transports.
#[derive(Debug, Default)]
pub struct InMemoryAuditTaskQueue {
    state: Mutex<QueueState>,
    task_ready: Notify,
}

impl InMemoryAuditTaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_claim(
        &self,
        consumer_id: &str,
        visibility_timeout: Duration,
    ) -> Option<TaskDelivery> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.requeue_expired(now);

        let task_id = state.ready.iter_mut().find_map(VecDeque::pop_front)?;
        let stored = state.tasks.get_mut(&task_id)?;
        let receipt = format!("{consumer_id}:{}", uuid::Uuid::new_v4());

        stored.delivery_count += 1;
        stored.lease = Some(TaskLease {
            receipt: receipt.clone(),
            expires_at: now + visibility_timeout,
        });

        Some(TaskDelivery {
            task_id: task_id.to_string(),
            receipt,
            delivery_count: stored.delivery_count,
            task: stored.task.clone(),
        })
    }
}

fn lane_index(priority: JobPriority) -> usize {
    JobPriority::HIGHEST_FIRST
        .iter()
        .position(|candidate| *candidate == priority)
        .unwrap_or(JobPriority::HIGHEST_FIRST.len() - 1)
}

#[async_trait]
impl AuditTaskQueue for InMemoryAuditTaskQueue {
    async fn enqueue(&self, task: AuditTask) -> AppResult<String> {
        let mut state = self.state.lock().await;
        state.last_task_id += 1;
        let task_id = state.last_task_id;

        state.ready[lane_index(task.priority)].push_back(task_id);
        state.tasks.insert(
            task_id,
            StoredTask {
                task,
                delivery_count: 0,
                lease: None,
            },
        );
        drop(state);

        self.task_ready.notify_one();
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
            if let Some(delivery) = self.try_claim(consumer_id, visibility_timeout).await {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let step = WAKE_UP_STEP.min(deadline - now);
            let _ = tokio::time::timeout(step, self.task_ready.notified()).await;
        }
    }

    async fn ack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let held_task_id = state.held_mut(delivery).map(|(task_id, _)| task_id);
        if let Some(task_id) = held_task_id {
            state.tasks.remove(&task_id);
        }

        Ok(())
    }

    async fn nack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some((task_id, stored)) = state.held_mut(delivery) else {
            return Err(AppError::Conflict(format!(
                "audit task '{}' is not currently held with matching receipt",
                delivery.task_id
            )));
        };

        stored.lease = None;
        let lane = lane_index(stored.task.priority);
        state.ready[lane].push_front(task_id);
        drop(state);

        self.task_ready.notify_one();
        Ok(())
    }

    async fn extend_visibility(
        &self,
        delivery: &TaskDelivery,
        visibility_timeout: Duration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let Some((_, stored)) = state.held_mut(delivery) else {
            return Ok(false);
        };

        match stored.lease.as_mut() {
            Some(lease) if lease.expires_at > now => {
                lease.expires_at = now + visibility_timeout;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let in_flight = state
            .tasks
            .values()
            .filter(|stored| {
                stored
                    .lease
                    .as_ref()
                    .is_some_and(|lease| lease.expires_at > now)
            })
            .count();
        let ready = state.tasks.len() - in_flight;

        Ok(QueueDepth {
            ready: i64::try_from(ready).unwrap_or(i64::MAX),
            in_flight: i64::try_from(in_flight).unwrap_or(i64::MAX),
        })
    }
}
