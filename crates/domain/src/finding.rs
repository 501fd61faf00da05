use std::fmt::{Display, Formatter};

use auditor_core::{AppError, AppResult, JobId, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::CheckName;

/// Ordered finding severity, `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, no action required.
    Info,
    /// Low impact.
    Low,
    /// Medium impact.
    Medium,
    /// High impact.
    High,
    /// Critical impact or a check that could not run.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Info,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses storage or transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(AppError::Validation(format!(
                "unknown severity '{value}', expected one of info, low, medium, high, critical"
            ))),
        }
    }
}

impl Display for Severity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated finding ready to be appended to the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditFinding {
    job_id: JobId,
    resource_id: NonEmptyString,
    resource_type: NonEmptyString,
    check_type: CheckName,
    severity: Severity,
    description: NonEmptyString,
    recommendation: Option<String>,
    metadata: Value,
}

/// Raw finding fields before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditFindingInput {
    /// Owning job.
    pub job_id: JobId,
    /// Affected resource identifier.
    pub resource_id: String,
    /// Affected resource type.
    pub resource_type: String,
    /// Check that produced the finding.
    pub check_type: CheckName,
    /// Finding severity.
    pub severity: Severity,
    /// Human readable description.
    pub description: String,
    /// Optional remediation advice.
    pub recommendation: Option<String>,
    /// Structured metadata, must be a JSON object when present.
    pub metadata: Option<Value>,
}

impl NewAuditFinding {
    /// Creates a validated finding.
    pub fn new(input: NewAuditFindingInput) -> AppResult<Self> {
        let metadata = input
            .metadata
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        if !metadata.is_object() {
            return Err(AppError::Validation(
                "finding metadata must be a JSON object".to_owned(),
            ));
        }

        let recommendation = input.recommendation.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            job_id: input.job_id,
            resource_id: NonEmptyString::new(input.resource_id)?,
            resource_type: NonEmptyString::new(input.resource_type)?,
            check_type: input.check_type,
            severity: input.severity,
            description: NonEmptyString::new(input.description)?,
            recommendation,
            metadata,
        })
    }

    /// Returns owning job.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Returns affected resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns affected resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns producing check.
    #[must_use]
    pub fn check_type(&self) -> &CheckName {
        &self.check_type
    }

    /// Returns severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns optional recommendation.
    #[must_use]
    pub fn recommendation(&self) -> Option<&str> {
        self.recommendation.as_deref()
    }

    /// Returns structured metadata.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Attaches store-assigned identity, producing the persisted finding.
    #[must_use]
    pub fn into_persisted(self, id: i64, created_at: DateTime<Utc>) -> AuditFinding {
        AuditFinding {
            id,
            job_id: self.job_id,
            resource_id: self.resource_id.into(),
            resource_type: self.resource_type.into(),
            check_type: self.check_type,
            severity: self.severity,
            description: self.description.into(),
            recommendation: self.recommendation,
            metadata: self.metadata,
            created_at,
        }
    }
}

/// One persisted, immutable finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    /// Store-assigned monotonic identifier.
    pub id: i64,
    /// Owning job.
    pub job_id: JobId,
    /// Affected resource identifier.
    pub resource_id: String,
    /// Affected resource type.
    pub resource_type: String,
    /// Check that produced the finding.
    pub check_type: CheckName,
    /// Severity.
    pub severity: Severity,
    /// Description.
    pub description: String,
    /// Optional remediation advice.
    pub recommendation: Option<String>,
    /// Structured metadata object.
    pub metadata: Value,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}
