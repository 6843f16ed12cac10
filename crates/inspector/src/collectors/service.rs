//! Service collector: endpoints lookup per service.

use anyhow::{Context, Result};

use crate::cluster::ClusterCapability;
use crate::models::{Finding, Severity, ServiceEndpoints};

/// Check every service cluster-wide against its Endpoints object.
///
/// A missing Endpoints object and an Endpoints object with zero subsets each
/// produce a distinct low-severity finding. A service with at least one
/// subset produces none.
///
/// # Errors
/// List/get failures abort the collector; a 404 on the Endpoints lookup is
/// not a failure.
pub async fn collect(
    capability: &dyn ClusterCapability,
) -> Result<(Vec<ServiceEndpoints>, Vec<Finding>)> {
    let services = capability
        .list_services()
        .await
        .context("Failed to list services")?;

    let mut entries = Vec::new();
    let mut findings = Vec::new();

    for service in services {
        let (Some(name), Some(namespace)) = (service.metadata.name, service.metadata.namespace)
        else {
            continue;
        };

        let endpoints = capability
            .get_endpoints(&namespace, &name)
            .await
            .with_context(|| format!("Failed to fetch endpoints for {namespace}/{name}"))?;

        let entry = match endpoints {
            None => {
                findings.push(Finding::new(
                    format!("service {namespace}/{name}: no matching endpoints"),
                    format!("no Endpoints object named {name} exists in {namespace}"),
                    Severity::Low,
                ));
                ServiceEndpoints {
                    name,
                    namespace,
                    has_endpoints: false,
                    subsets: 0,
                }
            }
            Some(ep) => {
                let subsets = ep.subsets.map_or(0, |s| s.len());
                if subsets == 0 {
                    findings.push(Finding::new(
                        format!("service {namespace}/{name}: endpoints empty"),
                        format!("Endpoints object for {namespace}/{name} has no subsets"),
                        Severity::Low,
                    ));
                }
                ServiceEndpoints {
                    name,
                    namespace,
                    has_endpoints: true,
                    subsets,
                }
            }
        };
        entries.push(entry);
    }

    Ok((entries, findings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{endpoints, service, FakeCapability};

    #[tokio::test]
    async fn healthy_service_yields_no_findings() {
        let mut cap = FakeCapability::new("c1", "prod");
        cap.services = vec![service("api", "default")];
        cap.endpoints.insert(
            ("default".to_string(), "api".to_string()),
            endpoints("api", "default", 1),
        );

        let (entries, findings) = collect(&cap).await.unwrap();
        assert!(findings.is_empty());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_endpoints);
        assert_eq!(entries[0].subsets, 1);
    }

    #[tokio::test]
    async fn missing_and_empty_endpoints_yield_distinct_findings() {
        let mut cap = FakeCapability::new("c1", "prod");
        cap.services = vec![service("orphan", "default"), service("hollow", "default")];
        cap.endpoints.insert(
            ("default".to_string(), "hollow".to_string()),
            endpoints("hollow", "default", 0),
        );

        let (entries, findings) = collect(&cap).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert!(!entries[0].has_endpoints);
        assert!(entries[1].has_endpoints);

        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Low));
        assert!(findings
            .iter()
            .any(|f| f.title.contains("orphan") && f.title.contains("no matching endpoints")));
        assert!(findings
            .iter()
            .any(|f| f.title.contains("hollow") && f.title.contains("endpoints empty")));
    }
}
