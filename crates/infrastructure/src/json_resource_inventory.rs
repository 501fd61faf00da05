use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use auditor_application::{CloudResource, ResourceInventory};
use auditor_core::{AppError, AppResult};
use auditor_domain::{AccountTarget, CloudProvider};

/// Resource inventory loaded from a JSON document.
///
/// The document maps provider to account identifier to resources:
/// `{"azure": {"sub-1": [{"resource_id": "...", "resource_type": "...", "properties": {}}]}}`.
/// Accounts missing from the document are reported as unreachable.
#[derive(Debug, Clone, Default)]
pub struct JsonResourceInventory {
    accounts: HashMap<(CloudProvider, String), Vec<CloudResource>>,
}

impl JsonResourceInventory {
    /// Creates an inventory with no reachable accounts.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses an inventory document.
    pub fn from_json_str(document: &str) -> AppResult<Self> {
        let raw = serde_json::from_str::<HashMap<String, HashMap<String, Vec<CloudResource>>>>(
            document,
        )
        .map_err(|error| AppError::Validation(format!("invalid resource inventory: {error}")))?;

        let mut accounts = HashMap::new();
        for (provider, provider_accounts) in raw {
            let provider = CloudProvider::parse(provider.as_str())?;
            for (identifier, resources) in provider_accounts {
                if let Some(resource) = resources
                    .iter()
                    .find(|resource| resource.resource_id.trim().is_empty())
                {
                    return Err(AppError::Validation(format!(
                        "resource inventory for {provider} account '{identifier}' has a resource of type '{}' without resource_id",
                        resource.resource_type
                    )));
                }

                accounts.insert((provider, identifier), resources);
            }
        }

        Ok(Self { accounts })
    }

    /// Reads and parses an inventory document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read resource inventory '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_json_str(document.as_str())
    }

    /// Returns the number of accounts present in the inventory.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl ResourceInventory for JsonResourceInventory {
    async fn list_resources(
        &self,
        target: &AccountTarget,
        _credentials_ref: Option<&str>,
    ) -> AppResult<Vec<CloudResource>> {
        self.accounts
            .get(&(target.provider(), target.identifier().to_owned()))
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "{} account '{}' is not reachable from this worker",
                    target.provider(),
                    target.identifier()
                ))
            })
    }
}
