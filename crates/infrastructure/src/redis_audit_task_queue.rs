//! Redis-backed reliable queue for audit tasks.

use std::time::Duration;

use async_trait::async_trait;
use auditor_application::{AuditTask, AuditTaskQueue, QueueDepth, TaskDelivery};
use auditor_core::{AppError, AppResult};
use auditor_domain::JobPriority;
use redis::Script;
use redis::aio::MultiplexedConnection;
use tokio::time::Instant;

const DEFAULT_POLL_STEP: Duration = Duration::from_millis(250);

// KEYS: ready:high, ready:medium, ready:low, inflight, tasks, receipts, deliveries, lanes, seq
const ENQUEUE_SCRIPT: &str = r#"
local task_id = tostring(redis.call('INCR', KEYS[9]))
redis.call('HSET', KEYS[5], task_id, ARGV[2])
redis.call('HSET', KEYS[8], task_id, ARGV[1])
redis.call('LPUSH', KEYS[tonumber(ARGV[1])], task_id)
return task_id
"#;

const DEQUEUE_SCRIPT: &str = r#"
local time = redis.call('TIME')
local now_ms = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)

local expired = redis.call('ZRANGEBYSCORE', KEYS[4], '-inf', now_ms)
for _, task_id in ipairs(expired) do
  redis.call('ZREM', KEYS[4], task_id)
  redis.call('HDEL', KEYS[6], task_id)
  local lane = redis.call('HGET', KEYS[8], task_id)
  if lane then
    redis.call('RPUSH', KEYS[tonumber(lane)], task_id)
  end
end

for lane = 1, 3 do
  local task_id = redis.call('RPOP', KEYS[lane])
  if task_id then
    local payload = redis.call('HGET', KEYS[5], task_id)
    if payload then
      redis.call('ZADD', KEYS[4], now_ms + tonumber(ARGV[1]), task_id)
      redis.call('HSET', KEYS[6], task_id, ARGV[2])
      local count = redis.call('HINCRBY', KEYS[7], task_id, 1)
      return {task_id, count, payload}
    end
  end
end

return false
"#;

const ACK_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[6], ARGV[1]) == ARGV[2] then
  redis.call('ZREM', KEYS[4], ARGV[1])
  redis.call('HDEL', KEYS[6], ARGV[1])
  redis.call('HDEL', KEYS[5], ARGV[1])
  redis.call('HDEL', KEYS[7], ARGV[1])
  redis.call('HDEL', KEYS[8], ARGV[1])
  return 1
end
return 0
"#;

const NACK_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[6], ARGV[1]) == ARGV[2] then
  redis.call('ZREM', KEYS[4], ARGV[1])
  redis.call('HDEL', KEYS[6], ARGV[1])
  local lane = redis.call('HGET', KEYS[8], ARGV[1])
  redis.call('RPUSH', KEYS[tonumber(lane)], ARGV[1])
  return 1
end
return 0
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[6], ARGV[1]) == ARGV[2] then
  local time = redis.call('TIME')
  local now_ms = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)
  return redis.call('ZADD', KEYS[4], 'XX', 'CH', now_ms + tonumber(ARGV[3]), ARGV[1]) + 1
end
return 0
"#;

const DEPTH_SCRIPT: &str = r#"
local time = redis.call('TIME')
local now_ms = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)
local ready = redis.call('LLEN', KEYS[1]) + redis.call('LLEN', KEYS[2]) + redis.call('LLEN', KEYS[3])
local expired = redis.call('ZCOUNT', KEYS[4], '-inf', now_ms)
local total = redis.call('ZCARD', KEYS[4])
return {ready + expired, total - expired}
"#;

/// Redis implementation of the audit task queue.
///
/// Ready tasks live in one list per priority, delivered tasks in a sorted set scored by
/// visibility deadline. Expired deliveries are moved back to their list on the next dequeue.
#[derive(Clone)]
pub struct RedisAuditTaskQueue {
    client: redis::Client,
    key_prefix: String,
    poll_step: Duration,
}

impl RedisAuditTaskQueue {
    /// Creates one queue adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            poll_step: DEFAULT_POLL_STEP,
        }
    }

    /// Overrides the interval between dequeue attempts while waiting for work.
    #[must_use]
    pub fn with_poll_step(mut self, poll_step: Duration) -> Self {
        self.poll_step = poll_step.max(Duration::from_millis(10));
        self
    }

    fn keys(&self) -> [String; 9] {
        let prefix = self.key_prefix.as_str();
        [
            format!("{prefix}:ready:high"),
            format!("{prefix}:ready:medium"),
            format!("{prefix}:ready:low"),
            format!("{prefix}:inflight"),
            format!("{prefix}:tasks"),
            format!("{prefix}:receipts"),
            format!("{prefix}:deliveries"),
            format!("{prefix}:lanes"),
            format!("{prefix}:seq"),
        ]
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }

    async fn run_script<T: redis::FromRedisValue>(
        &self,
        source: &str,
        args: &[String],
        action: &str,
    ) -> AppResult<T> {
        let script = Script::new(source);
        let mut invocation = script.prepare_invoke();
        for key in self.keys() {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }

        let mut connection = self.connection().await?;
        invocation
            .invoke_async::<T>(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to {action}: {error}")))
    }
}

fn lane_for(priority: JobPriority) -> u8 {
    match priority {
        JobPriority::High => 1,
        JobPriority::Medium => 2,
        JobPriority::Low => 3,
    }
}

fn duration_millis(duration: Duration) -> String {
    duration.as_millis().max(1).to_string()
}

#[async_trait]
impl AuditTaskQueue for RedisAuditTaskQueue {
    async fn enqueue(&self, task: AuditTask) -> AppResult<String> {
        let payload = serde_json::to_string(&task).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize audit task '{}': {error}",
                task.job_id
            ))
        })?;

        self.run_script::<String>(
            ENQUEUE_SCRIPT,
            &[lane_for(task.priority).to_string(), payload],
            "enqueue audit task",
        )
        .await
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
            let receipt = format!("{consumer_id}:{}", uuid::Uuid::new_v4());
            let claimed = self
                .run_script::<Option<(String, i64, String)>>(
                    DEQUEUE_SCRIPT,
                    &[duration_millis(visibility_timeout), receipt.clone()],
                    "dequeue audit task",
                )
                .await?;

            if let Some((task_id, delivery_count, payload)) = claimed {
                let task = serde_json::from_str::<AuditTask>(payload.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode audit task payload for task '{task_id}': {error}"
                    ))
                })?;
                let delivery_count = u32::try_from(delivery_count).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid delivery count for audit task '{task_id}': {error}"
                    ))
                })?;

                return Ok(Some(TaskDelivery {
                    task_id,
                    receipt,
                    delivery_count,
                    task,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            tokio::time::sleep(self.poll_step.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        self.run_script::<i64>(
            ACK_SCRIPT,
            &[delivery.task_id.clone(), delivery.receipt.clone()],
            "acknowledge audit task",
        )
        .await?;

        Ok(())
    }

    async fn nack(&self, delivery: &TaskDelivery) -> AppResult<()> {
        let returned = self
            .run_script::<i64>(
                NACK_SCRIPT,
                &[delivery.task_id.clone(), delivery.receipt.clone()],
                "return audit task to the queue",
            )
            .await?;

        if returned == 0 {
            return Err(AppError::Conflict(format!(
                "audit task '{}' is not currently held with matching receipt",
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
        let extended = self
            .run_script::<i64>(
                EXTEND_SCRIPT,
                &[
                    delivery.task_id.clone(),
                    delivery.receipt.clone(),
                    duration_millis(visibility_timeout),
                ],
                "extend audit task visibility",
            )
            .await?;

        Ok(extended > 0)
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let (ready, in_flight) = self
            .run_script::<(i64, i64)>(DEPTH_SCRIPT, &[], "read audit queue depth")
            .await?;

        Ok(QueueDepth { ready, in_flight })
    }
}
