//! Node collector: allocatable-utilization ratios and agent command batches.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::cluster::ClusterCapability;
use crate::config::InspectorConfig;
use crate::exec::RemoteExecutor;
use crate::models::{Finding, NodeCommandGroup, NodeInfo, NodeUsage, Severity};

/// A ratio above this fraction of allocatable produces a finding.
const UTILIZATION_THRESHOLD: f64 = 0.8;

/// Parse a Kubernetes resource quantity string into a plain number.
///
/// Handles the decimal SI suffixes (n/u/m/k/M/G/T/P/E), the binary suffixes
/// (Ki..Ei) and scientific notation. Unparseable input counts as zero.
pub(crate) fn parse_quantity(quantity: &Quantity) -> f64 {
    let s = quantity.0.trim();
    if s.is_empty() {
        return 0.0;
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        // Scientific notation ("12e6") lands here
        _ => return s.parse().unwrap_or(0.0),
    };

    number.parse::<f64>().unwrap_or(0.0) * multiplier
}

fn quantity_sum(pod: &Pod, limits: bool, key: &str) -> f64 {
    let Some(spec) = &pod.spec else { return 0.0 };
    spec.containers
        .iter()
        .filter_map(|c| c.resources.as_ref())
        .filter_map(|r| {
            if limits {
                r.limits.as_ref()
            } else {
                r.requests.as_ref()
            }
        })
        .filter_map(|map| map.get(key))
        .map(parse_quantity)
        .sum()
}

fn allocatable(node: &Node, key: &str) -> f64 {
    node.status
        .as_ref()
        .and_then(|s| s.allocatable.as_ref())
        .and_then(|map| map.get(key))
        .map_or(0.0, parse_quantity)
}

fn ratio(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total
    } else {
        0.0
    }
}

/// Compute the five utilization ratios for one node from the pods scheduled
/// on it.
async fn node_usage(
    capability: &dyn ClusterCapability,
    node: &Node,
    node_name: &str,
) -> Result<NodeUsage> {
    let pods = capability
        .list_pods(None, None, Some(&format!("spec.nodeName={node_name}")))
        .await
        .with_context(|| format!("Failed to list pods on node {node_name}"))?;

    let limits_cpu: f64 = pods.iter().map(|p| quantity_sum(p, true, "cpu")).sum();
    let limits_memory: f64 = pods.iter().map(|p| quantity_sum(p, true, "memory")).sum();
    let requests_cpu: f64 = pods.iter().map(|p| quantity_sum(p, false, "cpu")).sum();
    let requests_memory: f64 = pods.iter().map(|p| quantity_sum(p, false, "memory")).sum();

    #[allow(clippy::cast_precision_loss)]
    let pod_count = pods.len() as f64;

    Ok(NodeUsage {
        limits_cpu: ratio(limits_cpu, allocatable(node, "cpu")),
        limits_memory: ratio(limits_memory, allocatable(node, "memory")),
        requests_cpu: ratio(requests_cpu, allocatable(node, "cpu")),
        requests_memory: ratio(requests_memory, allocatable(node, "memory")),
        requests_pods: ratio(pod_count, allocatable(node, "pods")),
    })
}

/// Findings for every ratio above the utilization threshold. Each ratio is
/// judged independently of the other four.
pub(crate) fn usage_findings(node_name: &str, usage: &NodeUsage) -> Vec<Finding> {
    let ratios = [
        ("CPU limits", usage.limits_cpu),
        ("memory limits", usage.limits_memory),
        ("CPU requests", usage.requests_cpu),
        ("memory requests", usage.requests_memory),
        ("pod requests", usage.requests_pods),
    ];

    ratios
        .iter()
        .filter(|(_, value)| *value > UTILIZATION_THRESHOLD)
        .map(|(label, value)| {
            Finding::new(
                format!("node {node_name}: high {label}"),
                format!("{label} at {:.1}% of allocatable", value * 100.0),
                Severity::Medium,
            )
        })
        .collect()
}

/// Inspect every node covered by the configured command groups.
///
/// Agent pods are discovered by label selector; a pod's node must appear in
/// a group's node-name set to be inspected. The command batch runs inside
/// the agent pod with no timeout and no retry.
///
/// # Errors
/// Any list/get/exec failure aborts the collector.
pub async fn collect(
    capability: &dyn ClusterCapability,
    config: &InspectorConfig,
    groups: &[NodeCommandGroup],
) -> Result<(Vec<NodeInfo>, Vec<Finding>)> {
    let agent_pods = capability
        .list_pods(
            Some(&config.agent_namespace),
            Some(&config.agent_selector),
            None,
        )
        .await
        .context("Failed to list agent pods")?;

    let executor = RemoteExecutor::new(config);
    let mut nodes = Vec::new();
    let mut findings = Vec::new();

    for group in groups {
        // Dedupes multiple agent pods on one node. Scoped per group: a node
        // named in several groups runs every group's batch.
        let mut seen: HashSet<String> = HashSet::new();
        for pod in &agent_pods {
            let Some(pod_name) = pod.metadata.name.clone() else {
                continue;
            };
            let Some(node_name) = pod.spec.as_ref().and_then(|s| s.node_name.clone()) else {
                continue;
            };
            if !group.nodes.contains(&node_name) || !seen.insert(node_name.clone()) {
                continue;
            }

            let Some(node) = capability
                .get_node(&node_name)
                .await
                .with_context(|| format!("Failed to fetch node {node_name}"))?
            else {
                warn!(node = %node_name, "Agent pod references a node that no longer exists");
                continue;
            };

            let usage = node_usage(capability, &node, &node_name).await?;
            findings.extend(usage_findings(&node_name, &usage));

            let commands = executor
                .run_batch(capability, &pod_name, &group.commands)
                .await
                .with_context(|| format!("Command batch failed on node {node_name}"))?;

            for result in &commands {
                if let Some(error) = &result.error {
                    findings.push(Finding::new(
                        format!("node {node_name}: {}", result.description),
                        error.clone(),
                        Severity::Medium,
                    ));
                }
            }

            debug!(node = %node_name, commands = commands.len(), "Node inspected");

            nodes.push(NodeInfo {
                name: node_name,
                usage,
                commands,
            });
        }
    }

    Ok((nodes, findings))
}
