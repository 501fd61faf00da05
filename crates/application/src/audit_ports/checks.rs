use std::time::Duration;

use async_trait::async_trait;
use auditor_core::{AppResult, JobId};
use auditor_domain::{AccountTarget, CheckName, CloudProvider, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Static description of one registered check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDescriptor {
    /// Stable check name.
    pub name: CheckName,
    /// One-line summary.
    pub summary: String,
    /// Providers the check can audit.
    pub providers: Vec<CloudProvider>,
}

impl CheckDescriptor {
    /// Returns whether the check can run against `provider`.
    #[must_use]
    pub fn supports(&self, provider: CloudProvider) -> bool {
        self.providers.contains(&provider)
    }
}

/// Execution context handed to one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckContext {
    /// Job being executed.
    pub job_id: JobId,
    /// Target cloud account.
    pub target: AccountTarget,
    /// Optional opaque credentials reference.
    pub credentials_ref: Option<String>,
}

/// Finding produced by a check before it is bound to a job.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingDraft {
    /// Affected resource identifier.
    pub resource_id: String,
    /// Affected resource type.
    pub resource_type: String,
    /// Severity.
    pub severity: Severity,
    /// Description.
    pub description: String,
    /// Optional remediation advice.
    pub recommendation: Option<String>,
    /// Optional structured metadata object.
    pub metadata: Option<Value>,
}

/// Fault raised by a single check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckFault {
    /// The check returned an error.
    #[error("check failed: {0}")]
    Failed(String),

    /// The check exceeded the per-check timeout.
    #[error("check timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),
}

impl CheckFault {
    /// Returns stable fault kind label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// One executable unit of audit logic.
#[async_trait]
pub trait AuditCheck: Send + Sync {
    /// Returns the check descriptor.
    fn descriptor(&self) -> &CheckDescriptor;

    /// Runs the check against the context target.
    async fn run(&self, context: &CheckContext) -> Result<Vec<FindingDraft>, CheckFault>;
}

/// One cloud resource as reported by an inventory source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResource {
    /// Provider resource identifier.
    pub resource_id: String,
    /// Resource type such as `storage_account` or `security_group`.
    pub resource_type: String,
    /// Provider-specific properties.
    #[serde(default)]
    pub properties: Value,
}

/// Port used by checks to enumerate resources of one account.
#[async_trait]
pub trait ResourceInventory: Send + Sync {
    /// Lists resources visible in the target account.
    async fn list_resources(
        &self,
        target: &AccountTarget,
        credentials_ref: Option<&str>,
    ) -> AppResult<Vec<CloudResource>>;
}
