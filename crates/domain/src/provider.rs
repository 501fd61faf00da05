use std::fmt::{Display, Formatter};

use auditor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const ACCOUNT_IDENTIFIER_MAX_LENGTH: usize = 128;

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    /// Microsoft Azure, addressed by subscription.
    Azure,
    /// Amazon Web Services, addressed by account.
    Aws,
    /// Google Cloud Platform, addressed by project.
    Gcp,
}

impl CloudProvider {
    /// All supported providers in a stable order.
    pub const ALL: [Self; 3] = [Self::Azure, Self::Aws, Self::Gcp];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::Aws => "aws",
            Self::Gcp => "gcp",
        }
    }

    /// Parses storage or transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            _ => Err(AppError::Validation(format!(
                "unsupported cloud_provider '{value}', expected one of azure, aws, gcp"
            ))),
        }
    }

    /// Returns the name of the account identifier field this provider requires.
    #[must_use]
    pub fn identifier_field(&self) -> &'static str {
        match self {
            Self::Azure => "subscription_id",
            Self::Aws => "account_id",
            Self::Gcp => "project_id",
        }
    }
}

impl Display for CloudProvider {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The one cloud account an audit job runs against.
///
/// Exactly one identifier exists and it always matches the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cloud_provider", rename_all = "snake_case")]
pub enum AccountTarget {
    /// Azure subscription.
    Azure {
        /// Subscription identifier.
        subscription_id: String,
    },
    /// AWS account.
    Aws {
        /// Account identifier.
        account_id: String,
    },
    /// GCP project.
    Gcp {
        /// Project identifier.
        project_id: String,
    },
}

impl AccountTarget {
    /// Builds a target from the flat identifier columns used by requests and storage.
    ///
    /// The identifier matching `provider` must be present and the other two must be absent.
    pub fn from_parts(
        provider: CloudProvider,
        subscription_id: Option<String>,
        account_id: Option<String>,
        project_id: Option<String>,
    ) -> AppResult<Self> {
        let subscription_id = normalize_identifier(subscription_id);
        let account_id = normalize_identifier(account_id);
        let project_id = normalize_identifier(project_id);

        let (matching, others) = match provider {
            CloudProvider::Azure => (
                subscription_id,
                [("account_id", &account_id), ("project_id", &project_id)],
            ),
            CloudProvider::Aws => (
                account_id,
                [
                    ("subscription_id", &subscription_id),
                    ("project_id", &project_id),
                ],
            ),
            CloudProvider::Gcp => (
                project_id,
                [
                    ("subscription_id", &subscription_id),
                    ("account_id", &account_id),
                ],
            ),
        };

        if let Some((field, _)) = others.iter().find(|(_, value)| value.is_some()) {
            return Err(AppError::Validation(format!(
                "{field} must not be set for cloud_provider '{provider}'"
            )));
        }

        let identifier = matching.ok_or_else(|| {
            AppError::Validation(format!(
                "{} required for cloud_provider '{provider}'",
                provider.identifier_field()
            ))
        })?;

        if identifier.len() > ACCOUNT_IDENTIFIER_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "{} must be at most {ACCOUNT_IDENTIFIER_MAX_LENGTH} characters",
                provider.identifier_field()
            )));
        }

        Ok(match provider {
            CloudProvider::Azure => Self::Azure {
                subscription_id: identifier,
            },
            CloudProvider::Aws => Self::Aws {
                account_id: identifier,
            },
            CloudProvider::Gcp => Self::Gcp {
                project_id: identifier,
            },
        })
    }

    /// Returns the provider of this target.
    #[must_use]
    pub fn provider(&self) -> CloudProvider {
        match self {
            Self::Azure { .. } => CloudProvider::Azure,
            Self::Aws { .. } => CloudProvider::Aws,
            Self::Gcp { .. } => CloudProvider::Gcp,
        }
    }

    /// Returns the provider-specific account identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Azure { subscription_id } => subscription_id.as_str(),
            Self::Aws { account_id } => account_id.as_str(),
            Self::Gcp { project_id } => project_id.as_str(),
        }
    }

    /// Returns the Azure subscription identifier, if this is an Azure target.
    #[must_use]
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            Self::Azure { subscription_id } => Some(subscription_id.as_str()),
            _ => None,
        }
    }

    /// Returns the AWS account identifier, if this is an AWS target.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Aws { account_id } => Some(account_id.as_str()),
            _ => None,
        }
    }

    /// Returns the GCP project identifier, if this is a GCP target.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Gcp { project_id } => Some(project_id.as_str()),
            _ => None,
        }
    }
}

fn normalize_identifier(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
