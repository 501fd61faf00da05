use super::*;

pub(super) fn empty_resource_groups(
    context: &CheckContext,
    resources: &[CloudResource],
) -> Vec<FindingDraft> {
    let groups = resources
        .iter()
        .filter(|resource| resource.resource_type == "resource_group")
        .collect::<Vec<_>>();

    if groups.is_empty() {
        return vec![account_finding(
            context,
            Severity::Low,
            "No resource groups found in subscription".to_owned(),
            "This might be a new subscription",
            json!({}),
        )];
    }

    groups
        .into_iter()
        .filter(|group| {
            group
                .properties
                .get("resource_count")
                .and_then(Value::as_u64)
                == Some(0)
        })
        .map(|group| {
            let name = str_property(group, "name").unwrap_or(group.resource_id.as_str());
            resource_finding(
                group,
                Severity::Low,
                format!("Resource group '{name}' is empty"),
                "Consider deleting empty resource groups",
                json!({ "resource_group": name }),
            )
        })
        .collect()
}
