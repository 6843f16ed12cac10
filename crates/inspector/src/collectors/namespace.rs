//! Namespace collector: object counts, quota and emptiness checks.

use anyhow::{Context, Result};
use tracing::debug;

use crate::cluster::{ClusterCapability, CountedKind, COUNTED_KINDS};
use crate::models::{Finding, NamespaceInventory, Severity};

/// Count every tracked object kind in every namespace.
///
/// A namespace without a `ResourceQuota` gets a low-severity finding, and an
/// otherwise empty namespace gets a separate one.
///
/// # Errors
/// Any count failure aborts the collector.
pub async fn collect(
    capability: &dyn ClusterCapability,
) -> Result<(Vec<NamespaceInventory>, Vec<Finding>)> {
    let namespaces = capability
        .list_namespaces()
        .await
        .context("Failed to list namespaces")?;

    let mut inventories = Vec::new();
    let mut findings = Vec::new();

    for ns in namespaces {
        let Some(name) = ns.metadata.name else {
            continue;
        };

        let mut inventory = NamespaceInventory {
            name: name.clone(),
            ..NamespaceInventory::default()
        };

        for kind in COUNTED_KINDS {
            let count = capability
                .count_objects(kind, &name)
                .await
                .with_context(|| format!("Failed to count objects in namespace {name}"))?;
            match kind {
                CountedKind::Pods => inventory.pods = count,
                CountedKind::Services => inventory.services = count,
                CountedKind::Deployments => inventory.deployments = count,
                CountedKind::ReplicaSets => inventory.replica_sets = count,
                CountedKind::StatefulSets => inventory.stateful_sets = count,
                CountedKind::DaemonSets => inventory.daemon_sets = count,
                CountedKind::Jobs => inventory.jobs = count,
                CountedKind::Secrets => inventory.secrets = count,
                CountedKind::ConfigMaps => inventory.config_maps = count,
                CountedKind::ResourceQuotas => inventory.resource_quotas = count,
            }
        }

        if inventory.resource_quotas == 0 {
            findings.push(Finding::new(
                format!("namespace {name}: no resource quota"),
                format!("namespace {name} has no ResourceQuota object"),
                Severity::Low,
            ));
        }
        if inventory.object_total() == 0 {
            findings.push(Finding::new(
                format!("namespace {name}: empty"),
                format!("namespace {name} contains no tracked objects"),
                Severity::Low,
            ));
        }

        debug!(namespace = %name, objects = inventory.object_total(), "Namespace counted");
        inventories.push(inventory);
    }

    Ok((inventories, findings))
}
