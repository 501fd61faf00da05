//! Built-in audit checks evaluated over a resource inventory.

use std::sync::Arc;

use async_trait::async_trait;
use auditor_application::{
    AuditCheck, CheckContext, CheckDescriptor, CheckFault, CheckRegistry, CloudResource,
    FindingDraft, ResourceInventory,
};
use auditor_core::AppResult;
use auditor_domain::{CheckName, CloudProvider, Severity};
use serde_json::{Value, json};

mod connectivity;
mod network;
mod resource_groups;
mod storage;

use connectivity::InventoryConnectivityCheck;

const ALL_PROVIDERS: &[CloudProvider] = &CloudProvider::ALL;

type Evaluate = fn(&CheckContext, &[CloudResource]) -> Vec<FindingDraft>;

#[derive(Clone, Copy)]
enum CheckKind {
    Inventory(Evaluate),
    Connectivity,
}

struct BuiltinCheckDefinition {
    name: &'static str,
    summary: &'static str,
    providers: &'static [CloudProvider],
    kind: CheckKind,
}

const BUILTIN_CHECKS: &[BuiltinCheckDefinition] = &[
    BuiltinCheckDefinition {
        name: "storage-encryption",
        summary: "Storage accounts and buckets enforce encryption at rest",
        providers: ALL_PROVIDERS,
        kind: CheckKind::Inventory(storage::storage_encryption),
    },
    BuiltinCheckDefinition {
        name: "open-ports",
        summary: "Network rules do not expose ports to the internet",
        providers: ALL_PROVIDERS,
        kind: CheckKind::Inventory(network::open_ports),
    },
    BuiltinCheckDefinition {
        name: "public-access",
        summary: "Storage is not readable anonymously",
        providers: ALL_PROVIDERS,
        kind: CheckKind::Inventory(storage::public_access),
    },
    BuiltinCheckDefinition {
        name: "empty-resource-groups",
        summary: "Resource groups hold at least one resource",
        providers: &[CloudProvider::Azure],
        kind: CheckKind::Inventory(resource_groups::empty_resource_groups),
    },
    BuiltinCheckDefinition {
        name: "inventory-connectivity",
        summary: "The account inventory is reachable with the configured credentials",
        providers: ALL_PROVIDERS,
        kind: CheckKind::Connectivity,
    },
];

impl BuiltinCheckDefinition {
    fn descriptor(&self) -> AppResult<CheckDescriptor> {
        Ok(CheckDescriptor {
            name: CheckName::new(self.name)?,
            summary: self.summary.to_owned(),
            providers: self.providers.to_vec(),
        })
    }
}

/// Returns descriptors for every built-in check in registration order.
pub fn builtin_check_descriptors() -> AppResult<Vec<CheckDescriptor>> {
    BUILTIN_CHECKS
        .iter()
        .map(BuiltinCheckDefinition::descriptor)
        .collect()
}

/// Builds every built-in check over one inventory source.
pub fn builtin_checks(inventory: Arc<dyn ResourceInventory>) -> AppResult<Vec<Arc<dyn AuditCheck>>> {
    BUILTIN_CHECKS
        .iter()
        .map(|definition| -> AppResult<Arc<dyn AuditCheck>> {
            let descriptor = definition.descriptor()?;
            let check: Arc<dyn AuditCheck> = match definition.kind {
                CheckKind::Inventory(evaluate) => Arc::new(InventoryCheck {
                    descriptor,
                    inventory: Arc::clone(&inventory),
                    evaluate,
                }),
                CheckKind::Connectivity => Arc::new(InventoryConnectivityCheck::new(
                    descriptor,
                    Arc::clone(&inventory),
                )),
            };
            Ok(check)
        })
        .collect()
}

/// Builds a registry holding every built-in check.
pub fn builtin_check_registry(inventory: Arc<dyn ResourceInventory>) -> AppResult<CheckRegistry> {
    CheckRegistry::from_checks(builtin_checks(inventory)?)
}

/// Check that lists the account inventory and evaluates the resources.
struct InventoryCheck {
    descriptor: CheckDescriptor,
    inventory: Arc<dyn ResourceInventory>,
    evaluate: Evaluate,
}

#[async_trait]
impl AuditCheck for InventoryCheck {
    fn descriptor(&self) -> &CheckDescriptor {
        &self.descriptor
    }

    async fn run(&self, context: &CheckContext) -> Result<Vec<FindingDraft>, CheckFault> {
        let resources = self
            .inventory
            .list_resources(&context.target, context.credentials_ref.as_deref())
            .await
            .map_err(|error| CheckFault::Failed(error.to_string()))?;

        Ok((self.evaluate)(context, resources.as_slice()))
    }
}

fn bool_property(resource: &CloudResource, key: &str) -> Option<bool> {
    resource.properties.get(key).and_then(Value::as_bool)
}

fn str_property<'a>(resource: &'a CloudResource, key: &str) -> Option<&'a str> {
    resource.properties.get(key).and_then(Value::as_str)
}

fn resource_finding(
    resource: &CloudResource,
    severity: Severity,
    description: String,
    recommendation: &str,
    metadata: Value,
) -> FindingDraft {
    FindingDraft {
        resource_id: resource.resource_id.clone(),
        resource_type: resource.resource_type.clone(),
        severity,
        description,
        recommendation: Some(recommendation.to_owned()),
        metadata: Some(metadata),
    }
}

fn account_resource_type(provider: CloudProvider) -> &'static str {
    match provider {
        CloudProvider::Azure => "subscription",
        CloudProvider::Aws => "account",
        CloudProvider::Gcp => "project",
    }
}

fn account_finding(
    context: &CheckContext,
    severity: Severity,
    description: String,
    recommendation: &str,
    metadata: Value,
) -> FindingDraft {
    let provider = context.target.provider();
    let mut metadata = metadata;
    if let Some(object) = metadata.as_object_mut() {
        object.insert(
            provider.identifier_field().to_owned(),
            json!(context.target.identifier()),
        );
    }

    FindingDraft {
        resource_id: context.target.identifier().to_owned(),
        resource_type: account_resource_type(provider).to_owned(),
        severity,
        description,
        recommendation: Some(recommendation.to_owned()),
        metadata: Some(metadata),
    }
}

#[cfg(test)]
mod tests;
