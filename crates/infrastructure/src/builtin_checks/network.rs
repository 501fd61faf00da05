use super::*;

const NETWORK_RESOURCE_TYPES: &[&str] = &["network_security_group", "security_group", "firewall_rule"];
const WORLD_SOURCES: &[&str] = &["0.0.0.0/0", "::/0", "*", "Internet", "Any"];
const ADMIN_PORTS: &[u64] = &[22, 3389];
const DATABASE_PORTS: &[u64] = &[1433, 3306, 5432, 6379, 9200, 27017];

fn port_severity(port: u64) -> Severity {
    if DATABASE_PORTS.contains(&port) {
        Severity::Critical
    } else if ADMIN_PORTS.contains(&port) {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Returns ports of inbound rules that accept traffic from anywhere.
fn world_open_ports(resource: &CloudResource) -> Vec<u64> {
    let Some(rules) = resource.properties.get("inbound_rules").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut ports = rules
        .iter()
        .filter(|rule| {
            rule.get("source")
                .and_then(Value::as_str)
                .is_some_and(|source| WORLD_SOURCES.contains(&source))
        })
        .filter(|rule| {
            rule.get("action")
                .and_then(Value::as_str)
                .is_none_or(|action| action.eq_ignore_ascii_case("allow"))
        })
        .filter_map(|rule| rule.get("port").and_then(Value::as_u64))
        .collect::<Vec<_>>();
    ports.sort_unstable();
    ports.dedup();
    ports
}

pub(super) fn open_ports(_context: &CheckContext, resources: &[CloudResource]) -> Vec<FindingDraft> {
    resources
        .iter()
        .filter(|resource| NETWORK_RESOURCE_TYPES.contains(&resource.resource_type.as_str()))
        .filter_map(|resource| {
            let ports = world_open_ports(resource);
            let severity = ports.iter().copied().map(port_severity).max()?;
            let listed = ports
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            Some(resource_finding(
                resource,
                severity,
                format!(
                    "Network rule set '{}' exposes ports {listed} to the internet",
                    resource.resource_id
                ),
                "Restrict inbound sources to known address ranges or use a bastion",
                json!({ "open_ports": ports }),
            ))
        })
        .collect()
}
