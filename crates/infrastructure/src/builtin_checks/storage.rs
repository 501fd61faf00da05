use super::*;

const STORAGE_RESOURCE_TYPES: &[&str] = &["storage_account", "s3_bucket", "gcs_bucket"];
const ALL_USERS_GRANTEES: &[&str] = &[
    "http://acs.amazonaws.com/groups/global/AllUsers",
    "allUsers",
    "allAuthenticatedUsers",
];

fn is_storage(resource: &CloudResource) -> bool {
    STORAGE_RESOURCE_TYPES.contains(&resource.resource_type.as_str())
}

pub(super) fn storage_encryption(
    _context: &CheckContext,
    resources: &[CloudResource],
) -> Vec<FindingDraft> {
    resources
        .iter()
        .filter(|resource| is_storage(resource))
        .filter_map(|resource| match bool_property(resource, "encryption_enabled") {
            Some(true) => None,
            Some(false) => Some(resource_finding(
                resource,
                Severity::High,
                format!(
                    "Storage resource '{}' does not enforce encryption at rest",
                    resource.resource_id
                ),
                "Enable default encryption with a platform or customer managed key",
                json!({ "encryption_enabled": false }),
            )),
            None => Some(resource_finding(
                resource,
                Severity::Medium,
                format!(
                    "Encryption status of storage resource '{}' could not be determined",
                    resource.resource_id
                ),
                "Ensure the audit identity can read storage encryption settings",
                json!({ "encryption_enabled": Value::Null }),
            )),
        })
        .collect()
}

pub(super) fn public_access(
    _context: &CheckContext,
    resources: &[CloudResource],
) -> Vec<FindingDraft> {
    resources
        .iter()
        .filter(|resource| is_storage(resource))
        .filter_map(|resource| {
            let public_flag = bool_property(resource, "public_access").unwrap_or(false);
            let public_grantee = resource
                .properties
                .get("grants")
                .and_then(Value::as_array)
                .and_then(|grants| {
                    grants
                        .iter()
                        .filter_map(|grant| grant.get("grantee").and_then(Value::as_str))
                        .find(|grantee| ALL_USERS_GRANTEES.contains(grantee))
                });

            if !public_flag && public_grantee.is_none() {
                return None;
            }

            Some(resource_finding(
                resource,
                Severity::High,
                format!("Storage resource '{}' is publicly accessible", resource.resource_id),
                "Review and restrict bucket permissions",
                json!({
                    "public_access": public_flag,
                    "grantee": public_grantee,
                }),
            ))
        })
        .collect()
}
