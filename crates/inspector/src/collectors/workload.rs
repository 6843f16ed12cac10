//! Workload collector: availability checks and concurrent tail-log capture.

use anyhow::{Context, Result};
use futures::future::join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use regex::Regex;
use tracing::{debug, warn};

use crate::cluster::ClusterCapability;
use crate::models::{
    Finding, PodLogs, Severity, WorkloadCondition, WorkloadInstance, WorkloadKind, WorkloadRef,
    WorkloadStatus,
};

/// Number of log lines captured per pod.
const TAIL_LINES: i64 = 10;

fn condition(
    condition_type: &str,
    status: &str,
    reason: Option<&str>,
    message: Option<&str>,
) -> WorkloadCondition {
    WorkloadCondition {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.map(str::to_string),
        message: message.map(str::to_string),
    }
}

/// No condition of type "Failed" with status "False" and no condition with
/// reason "Error".
fn conditions_healthy(conditions: &[WorkloadCondition]) -> bool {
    !conditions.iter().any(|c| {
        (c.condition_type == "Failed" && c.status == "False")
            || c.reason.as_deref() == Some("Error")
    })
}

fn selector_string(selector: Option<&LabelSelector>) -> Option<String> {
    let selector = selector?;

    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    for req in selector.match_expressions.iter().flatten() {
        let values = req
            .values
            .iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        let part = match req.operator.as_str() {
            "In" => format!("{} in ({values})", req.key),
            "NotIn" => format!("{} notin ({values})", req.key),
            "Exists" => req.key.clone(),
            "DoesNotExist" => format!("!{}", req.key),
            other => {
                warn!(key = %req.key, operator = %other, "Ignoring unknown selector operator");
                continue;
            }
        };
        parts.push(part);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// Availability verdict for one workload object.
struct Availability {
    available: bool,
    conditions: Vec<WorkloadCondition>,
    selector: Option<String>,
}

/// Fetch the workload object and evaluate its kind-specific availability
/// predicate. `Ok(None)` means the object does not exist (benign skip).
async fn assess(
    capability: &dyn ClusterCapability,
    entry: &WorkloadRef,
) -> Result<Option<Availability>> {
    let verdict = match entry.kind {
        WorkloadKind::Deployment => {
            let Some(d) = capability
                .get_deployment(&entry.namespace, &entry.name)
                .await?
            else {
                return Ok(None);
            };
            let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
            let available = d.status.as_ref().and_then(|s| s.available_replicas);
            let conditions: Vec<WorkloadCondition> = d
                .status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .map(|cs| {
                    cs.iter()
                        .map(|c| {
                            condition(
                                &c.type_,
                                &c.status,
                                c.reason.as_deref(),
                                c.message.as_deref(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Availability {
                available: available.unwrap_or(0) >= desired && conditions_healthy(&conditions),
                selector: selector_string(d.spec.as_ref().map(|s| &s.selector)),
                conditions,
            }
        }
        WorkloadKind::DaemonSet => {
            let Some(ds) = capability
                .get_daemon_set(&entry.namespace, &entry.name)
                .await?
            else {
                return Ok(None);
            };
            let desired = ds
                .status
                .as_ref()
                .map_or(0, |s| s.desired_number_scheduled);
            let available = ds.status.as_ref().and_then(|s| s.number_available);
            let conditions: Vec<WorkloadCondition> = ds
                .status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .map(|cs| {
                    cs.iter()
                        .map(|c| {
                            condition(
                                &c.type_,
                                &c.status,
                                c.reason.as_deref(),
                                c.message.as_deref(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Availability {
                available: available.unwrap_or(0) >= desired,
                selector: selector_string(ds.spec.as_ref().map(|s| &s.selector)),
                conditions,
            }
        }
        WorkloadKind::StatefulSet => {
            let Some(sts) = capability
                .get_stateful_set(&entry.namespace, &entry.name)
                .await?
            else {
                return Ok(None);
            };
            let desired = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
            let ready = sts.status.as_ref().and_then(|s| s.ready_replicas);
            let conditions: Vec<WorkloadCondition> = sts
                .status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .map(|cs| {
                    cs.iter()
                        .map(|c| {
                            condition(
                                &c.type_,
                                &c.status,
                                c.reason.as_deref(),
                                c.message.as_deref(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Availability {
                available: ready.unwrap_or(0) >= desired,
                selector: selector_string(sts.spec.as_ref().map(|s| &s.selector)),
                conditions,
            }
        }
        WorkloadKind::Job => {
            let Some(job) = capability.get_job(&entry.namespace, &entry.name).await? else {
                return Ok(None);
            };
            let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
            let succeeded = job.status.as_ref().and_then(|s| s.succeeded);
            let conditions: Vec<WorkloadCondition> = job
                .status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .map(|cs| {
                    cs.iter()
                        .map(|c| {
                            condition(
                                &c.type_,
                                &c.status,
                                c.reason.as_deref(),
                                c.message.as_deref(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Availability {
                available: succeeded.unwrap_or(0) >= completions,
                selector: job
                    .spec
                    .as_ref()
                    .and_then(|s| selector_string(s.selector.as_ref())),
                conditions,
            }
        }
    };
    Ok(Some(verdict))
}

/// Fetch tail logs for every matching pod, one concurrent worker per pod.
///
/// Workers are all awaited; an individual fetch failure is logged once and
/// that pod's entry is dropped from the result set.
async fn gather_logs(
    capability: &dyn ClusterCapability,
    namespace: &str,
    pod_names: Vec<String>,
    filter: Option<&Regex>,
) -> Vec<PodLogs> {
    let workers = pod_names.into_iter().map(|pod_name| async move {
        match capability.tail_logs(namespace, &pod_name, TAIL_LINES).await {
            Ok(raw) => {
                let lines = raw
                    .lines()
                    .filter(|line| filter.map_or(true, |re| re.is_match(line)))
                    .map(str::to_string)
                    .collect();
                Some(PodLogs {
                    name: pod_name,
                    lines,
                })
            }
            Err(e) => {
                warn!(pod = %pod_name, error = %e, "Dropping pod after log fetch failure");
                None
            }
        }
    });

    join_all(workers).await.into_iter().flatten().collect()
}

/// Inspect every configured workload entry.
///
/// Missing objects are skipped; one medium-severity finding is emitted per
/// unavailable workload.
///
/// # Errors
/// Object fetch or pod list failures abort the collector. Individual log
/// fetch failures do not.
pub async fn collect(
    capability: &dyn ClusterCapability,
    entries: &[WorkloadRef],
) -> Result<(Vec<WorkloadInstance>, Vec<Finding>)> {
    let mut workloads = Vec::new();
    let mut findings = Vec::new();

    for entry in entries {
        let Some(verdict) = assess(capability, entry).await.with_context(|| {
            format!(
                "Failed to fetch {} {}/{}",
                entry.kind.as_str(),
                entry.namespace,
                entry.name
            )
        })?
        else {
            debug!(
                kind = entry.kind.as_str(),
                namespace = %entry.namespace,
                name = %entry.name,
                "Workload not found, skipping"
            );
            continue;
        };

        let filter = match &entry.log_filter {
            Some(pattern) => Some(Regex::new(pattern).with_context(|| {
                format!("Invalid log filter for {}/{}", entry.namespace, entry.name)
            })?),
            None => None,
        };

        let pods = match &verdict.selector {
            Some(selector) => capability
                .list_pods(Some(&entry.namespace), Some(selector), None)
                .await
                .with_context(|| {
                    format!("Failed to list pods for {}/{}", entry.namespace, entry.name)
                })?,
            None => Vec::new(),
        };
        let pod_names: Vec<String> = pods
            .into_iter()
            .filter_map(|p| p.metadata.name)
            .collect();

        let pod_logs =
            gather_logs(capability, &entry.namespace, pod_names, filter.as_ref()).await;

        if !verdict.available {
            findings.push(Finding::new(
                format!(
                    "{} {}/{} unavailable",
                    entry.kind.as_str(),
                    entry.namespace,
                    entry.name
                ),
                format!(
                    "{} {} in namespace {} does not meet its availability target",
                    entry.kind.as_str(),
                    entry.name,
                    entry.namespace
                ),
                Severity::Medium,
            ));
        }

        workloads.push(WorkloadInstance {
            kind: entry.kind,
            name: entry.name.clone(),
            namespace: entry.namespace.clone(),
            status: WorkloadStatus {
                state: if verdict.available {
                    "Available".to_string()
                } else {
                    "Unavailable".to_string()
                },
                conditions: verdict.conditions,
            },
            pods: pod_logs,
        });
    }

    Ok((workloads, findings))
}
