use std::time::Duration;

use auditor_application::AuditService;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Runs the stall reaper on a fixed interval until the task is aborted.
pub fn spawn_stall_reaper(audit_service: AuditService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match audit_service.reap_stalled_jobs().await {
                Ok(reaped) if reaped.is_empty() => {}
                Ok(reaped) => info!(reaped_jobs = reaped.len(), "stall reaper failed stalled jobs"),
                Err(error) => warn!(error = %error, "stall reaper sweep failed"),
            }
        }
    })
}
