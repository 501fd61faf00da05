use super::*;

/// Reports whether the account inventory can be listed at all.
///
/// Unlike the other checks an inventory failure is a finding here, not a fault.
pub(super) struct InventoryConnectivityCheck {
    descriptor: CheckDescriptor,
    inventory: Arc<dyn ResourceInventory>,
}

impl InventoryConnectivityCheck {
    pub(super) fn new(descriptor: CheckDescriptor, inventory: Arc<dyn ResourceInventory>) -> Self {
        Self {
            descriptor,
            inventory,
        }
    }
}

#[async_trait]
impl AuditCheck for InventoryConnectivityCheck {
    fn descriptor(&self) -> &CheckDescriptor {
        &self.descriptor
    }

    async fn run(&self, context: &CheckContext) -> Result<Vec<FindingDraft>, CheckFault> {
        let provider = context.target.provider();
        let finding = match self
            .inventory
            .list_resources(&context.target, context.credentials_ref.as_deref())
            .await
        {
            Ok(resources) if resources.is_empty() => account_finding(
                context,
                Severity::Low,
                format!("No resources found in {provider} {}", account_resource_type(provider)),
                "This might be a new account",
                json!({ "resource_count": 0 }),
            ),
            Ok(resources) => account_finding(
                context,
                Severity::Info,
                format!(
                    "Inventory of {provider} {} is reachable with {} resources",
                    account_resource_type(provider),
                    resources.len()
                ),
                "No action required",
                json!({ "resource_count": resources.len() }),
            ),
            Err(error) => account_finding(
                context,
                Severity::High,
                format!(
                    "Cannot access {provider} {}: {error}",
                    account_resource_type(provider)
                ),
                "Check permissions and subscription validity",
                json!({ "error": error.to_string() }),
            ),
        };

        Ok(vec![finding])
    }
}
