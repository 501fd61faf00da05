use std::sync::Arc;

use auditor_application::{AuditCheck, CheckCatalog, CheckContext, CheckFault, FindingDraft};
use auditor_core::JobId;
use auditor_domain::{AccountTarget, CheckName, CloudProvider, Severity};

use super::{builtin_check_descriptors, builtin_check_registry};
use crate::JsonResourceInventory;

const INVENTORY: &str = r#"{
    "azure": {
        "sub-1": [
            {"resource_id": "rg-empty", "resource_type": "resource_group", "properties": {"name": "rg-empty", "resource_count": 0}},
            {"resource_id": "rg-app", "resource_type": "resource_group", "properties": {"name": "rg-app", "resource_count": 4}},
            {"resource_id": "stprod", "resource_type": "storage_account", "properties": {"encryption_enabled": false, "public_access": true}},
            {"resource_id": "stlogs", "resource_type": "storage_account", "properties": {"encryption_enabled": true}},
            {"resource_id": "nsg-web", "resource_type": "network_security_group", "properties": {"inbound_rules": [
                {"port": 443, "source": "Internet"},
                {"port": 22, "source": "0.0.0.0/0"},
                {"port": 5432, "source": "10.0.0.0/8"}
            ]}},
            {"resource_id": "nsg-db", "resource_type": "network_security_group", "properties": {"inbound_rules": [
                {"port": 5432, "source": "*"},
                {"port": 3389, "source": "*", "action": "Deny"}
            ]}}
        ],
        "sub-empty": []
    },
    "aws": {
        "123456789012": [
            {"resource_id": "logs-bucket", "resource_type": "s3_bucket", "properties": {
                "encryption_enabled": true,
                "grants": [{"grantee": "http://acs.amazonaws.com/groups/global/AllUsers"}]
            }},
            {"resource_id": "raw-bucket", "resource_type": "s3_bucket"}
        ]
    }
}"#;

fn azure(subscription_id: &str) -> CheckContext {
    CheckContext {
        job_id: JobId::new("builtin-checks").unwrap_or_else(|error| panic!("{error}")),
        target: AccountTarget::Azure {
            subscription_id: subscription_id.to_owned(),
        },
        credentials_ref: None,
    }
}

fn aws() -> CheckContext {
    CheckContext {
        job_id: JobId::new("builtin-checks").unwrap_or_else(|error| panic!("{error}")),
        target: AccountTarget::Aws {
            account_id: "123456789012".to_owned(),
        },
        credentials_ref: None,
    }
}

async fn run(name: &str, context: &CheckContext) -> Result<Vec<FindingDraft>, CheckFault> {
    let inventory = JsonResourceInventory::from_json_str(INVENTORY)
        .unwrap_or_else(|error| panic!("inventory should parse: {error}"));
    let registry = builtin_check_registry(Arc::new(inventory))
        .unwrap_or_else(|error| panic!("registry should build: {error}"));
    let check_name = CheckName::new(name).unwrap_or_else(|error| panic!("{error}"));
    let check = registry
        .get(&check_name)
        .unwrap_or_else(|| panic!("check '{name}' should be registered"));

    check.run(context).await
}

fn findings(result: Result<Vec<FindingDraft>, CheckFault>) -> Vec<FindingDraft> {
    result.unwrap_or_else(|fault| panic!("check should not fault: {fault}"))
}

#[test]
fn catalog_lists_builtin_checks_with_provider_support() {
    let descriptors =
        builtin_check_descriptors().unwrap_or_else(|error| panic!("descriptors: {error}"));
    let catalog = CheckCatalog::new(descriptors)
        .unwrap_or_else(|error| panic!("catalog should accept builtin checks: {error}"));

    let names = catalog
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "storage-encryption",
            "open-ports",
            "public-access",
            "empty-resource-groups",
            "inventory-connectivity",
        ]
    );

    assert_eq!(catalog.defaults_for(CloudProvider::Azure).len(), 5);
    let aws_defaults = catalog.defaults_for(CloudProvider::Aws);
    assert_eq!(aws_defaults.len(), 4);
    assert!(
        aws_defaults
            .iter()
            .all(|name| name.as_str() != "empty-resource-groups")
    );
}

#[tokio::test]
async fn storage_encryption_flags_unencrypted_and_unknown_storage() {
    let azure_findings = findings(run("storage-encryption", &azure("sub-1")).await);
    assert_eq!(azure_findings.len(), 1);
    assert_eq!(azure_findings[0].resource_id, "stprod");
    assert_eq!(azure_findings[0].severity, Severity::High);

    let aws_findings = findings(run("storage-encryption", &aws()).await);
    assert_eq!(aws_findings.len(), 1);
    assert_eq!(aws_findings[0].resource_id, "raw-bucket");
    assert_eq!(aws_findings[0].severity, Severity::Medium);
}

#[tokio::test]
async fn public_access_detects_flags_and_all_users_grants() {
    let azure_findings = findings(run("public-access", &azure("sub-1")).await);
    assert_eq!(azure_findings.len(), 1);
    assert_eq!(azure_findings[0].resource_id, "stprod");

    let aws_findings = findings(run("public-access", &aws()).await);
    assert_eq!(aws_findings.len(), 1);
    assert_eq!(aws_findings[0].resource_id, "logs-bucket");
    assert_eq!(
        aws_findings[0].recommendation.as_deref(),
        Some("Review and restrict bucket permissions")
    );
}

#[tokio::test]
async fn open_ports_reports_one_finding_per_rule_set_at_highest_severity() {
    let mut drafts = findings(run("open-ports", &azure("sub-1")).await);
    drafts.sort_by(|left, right| left.resource_id.cmp(&right.resource_id));

    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].resource_id, "nsg-db");
    assert_eq!(drafts[0].severity, Severity::Critical);
    assert_eq!(drafts[1].resource_id, "nsg-web");
    assert_eq!(drafts[1].severity, Severity::High);
    assert_eq!(
        drafts[1]
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("open_ports"))
            .cloned(),
        Some(serde_json::json!([22, 443]))
    );
}

#[tokio::test]
async fn empty_resource_groups_reports_empty_groups_or_an_empty_subscription() {
    let drafts = findings(run("empty-resource-groups", &azure("sub-1")).await);
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].resource_id, "rg-empty");
    assert_eq!(drafts[0].description, "Resource group 'rg-empty' is empty");

    let empty = findings(run("empty-resource-groups", &azure("sub-empty")).await);
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].resource_id, "sub-empty");
    assert_eq!(empty[0].resource_type, "subscription");
    assert_eq!(empty[0].severity, Severity::Low);
}

#[tokio::test]
async fn unreachable_accounts_fault_inventory_checks_but_not_connectivity() {
    let fault = run("storage-encryption", &azure("sub-missing")).await;
    assert!(matches!(fault, Err(CheckFault::Failed(_))));

    let connectivity = findings(run("inventory-connectivity", &azure("sub-missing")).await);
    assert_eq!(connectivity.len(), 1);
    assert_eq!(connectivity[0].severity, Severity::High);
    assert_eq!(connectivity[0].resource_id, "sub-missing");

    let reachable = findings(run("inventory-connectivity", &azure("sub-1")).await);
    assert_eq!(reachable[0].severity, Severity::Info);
    assert_eq!(
        reachable[0]
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("resource_count"))
            .and_then(serde_json::Value::as_u64),
        Some(6)
    );
}
