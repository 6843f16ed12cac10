//! Ingress collector: duplicate host+path detection across the cluster.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::cluster::ClusterCapability;
use crate::models::{Finding, IngressEntry, Severity};

/// Inspect every ingress rule cluster-wide and flag `host + path` keys
/// claimed by more than one ingress object.
///
/// Every contributing object gets its `duplicate_path` marker set, and one
/// low-severity finding per duplicated key lists all affected
/// `namespace/name` identifiers. Output ordering is deterministic, so an
/// unchanged ingress set yields an identical result.
///
/// # Errors
/// The ingress list failure aborts the collector.
pub async fn collect(
    capability: &dyn ClusterCapability,
) -> Result<(Vec<IngressEntry>, Vec<Finding>)> {
    let ingresses = capability
        .list_ingresses()
        .await
        .context("Failed to list ingresses")?;

    // host+path -> contributing namespace/name identifiers
    let mut claims: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut entries = Vec::new();

    for ingress in &ingresses {
        let (Some(name), Some(namespace)) = (
            ingress.metadata.name.as_ref(),
            ingress.metadata.namespace.as_ref(),
        ) else {
            continue;
        };
        let id = format!("{namespace}/{name}");

        for rule in ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .into_iter()
            .flatten()
        {
            let host = rule.host.clone().unwrap_or_default();
            for path in rule
                .http
                .as_ref()
                .map(|h| h.paths.as_slice())
                .unwrap_or_default()
            {
                let key = format!("{host}{}", path.path.clone().unwrap_or_default());
                claims.entry(key).or_default().insert(id.clone());
            }
        }

        entries.push(IngressEntry {
            name: name.clone(),
            namespace: namespace.clone(),
            duplicate_path: false,
        });
    }

    let mut findings = Vec::new();
    let mut flagged: HashSet<String> = HashSet::new();

    for (key, contributors) in &claims {
        if contributors.len() < 2 {
            continue;
        }
        flagged.extend(contributors.iter().cloned());
        findings.push(Finding::new(
            format!("duplicate ingress path {key}"),
            format!(
                "path {key} is defined by multiple ingresses: {}",
                contributors
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Severity::Low,
        ));
    }

    for entry in &mut entries {
        if flagged.contains(&format!("{}/{}", entry.namespace, entry.name)) {
            entry.duplicate_path = true;
        }
    }

    Ok((entries, findings))
}
