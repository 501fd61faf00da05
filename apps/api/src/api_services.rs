mod database;
mod redis;
mod stall_reaper;
mod state_builder;

pub use database::connect_and_migrate;
pub use redis::build_redis_client;
pub use stall_reaper::spawn_stall_reaper;
pub use state_builder::{build_app_state, build_task_queue};
