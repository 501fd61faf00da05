use std::sync::Arc;

use auditor_application::{JobStatusEventPublisher, ReaperLeaseCoordinator};
use auditor_infrastructure::{
    DEFAULT_JOB_STATUS_CHANNEL, RedisJobStatusEventPublisher, RedisReaperLeaseCoordinator,
};

use crate::api_config::ApiConfig;

const REAPER_LEASE_KEY_PREFIX: &str = "auditor:lease";

pub(super) fn build_event_publisher(
    config: &ApiConfig,
    redis_client: Option<&redis::Client>,
) -> Option<Arc<dyn JobStatusEventPublisher>> {
    if !config.events_enabled {
        return None;
    }

    redis_client.map(|client| -> Arc<dyn JobStatusEventPublisher> {
        Arc::new(RedisJobStatusEventPublisher::new(
            client.clone(),
            DEFAULT_JOB_STATUS_CHANNEL,
        ))
    })
}

pub(super) fn build_reaper_lease_coordinator(
    redis_client: Option<&redis::Client>,
) -> Option<Arc<dyn ReaperLeaseCoordinator>> {
    redis_client.map(|client| -> Arc<dyn ReaperLeaseCoordinator> {
        Arc::new(RedisReaperLeaseCoordinator::new(
            client.clone(),
            REAPER_LEASE_KEY_PREFIX,
        ))
    })
}
