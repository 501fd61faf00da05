use async_trait::async_trait;
use auditor_core::AppResult;

/// One distributed lease claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Distributed coordination port so one orchestrator replica sweeps stalled jobs per cycle.
#[async_trait]
pub trait ReaperLeaseCoordinator: Send + Sync {
    /// Attempts to acquire one lease for the given scope.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<ReaperLease>>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &ReaperLease) -> AppResult<()>;
}
