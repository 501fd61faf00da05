//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod builtin_checks;
mod http_job_control;
mod in_memory_audit_repository;
mod in_memory_audit_task_queue;
mod json_resource_inventory;
mod postgres_audit_repository;
mod postgres_audit_task_queue;
mod redis_audit_task_queue;
mod redis_job_status_event_publisher;
mod redis_reaper_lease_coordinator;

pub use builtin_checks::{builtin_check_descriptors, builtin_check_registry, builtin_checks};
pub use http_job_control::{HttpJobControl, WORKER_ID_HEADER};
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_audit_task_queue::InMemoryAuditTaskQueue;
pub use json_resource_inventory::JsonResourceInventory;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_audit_task_queue::PostgresAuditTaskQueue;
pub use redis_audit_task_queue::RedisAuditTaskQueue;
pub use redis_job_status_event_publisher::{
    DEFAULT_JOB_STATUS_CHANNEL, RedisJobStatusEventPublisher,
};
pub use redis_reaper_lease_coordinator::RedisReaperLeaseCoordinator;
