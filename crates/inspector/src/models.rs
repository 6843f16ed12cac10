//! Domain types for tasks, templates, reports and findings.
//!
//! Everything here is serde-tagged: the store persists Template and Report
//! payloads as opaque serialized values, so these structs define the full
//! serialization contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A structured, severity-tagged observation produced by a collector or the
/// alert merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Scheduled,
    Running,
    Completed,
    Failed,
}

/// Temporal trigger for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "kebab-case")]
pub enum Trigger {
    /// Run once at the given instant. A target in the past fires immediately.
    FixedTime(DateTime<Utc>),
    /// Run on every match of the cron expression.
    RecurringCron(String),
}

/// Chat-app credentials the orchestrator hands to the notification
/// collaborator after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTarget {
    pub app_id: String,
    pub app_secret: String,
}

/// A schedulable inspection unit (historically also called a Plan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub trigger: Trigger,
    pub state: TaskState,
    pub template_id: String,
    #[serde(default)]
    pub notify: Option<NotifyTarget>,
    /// Report produced by the most recent successful run
    #[serde(default)]
    pub report_id: Option<String>,
    /// Raw error text of the most recent failed run
    #[serde(default)]
    pub error: Option<String>,
}

/// One shell command the agent runs on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCommand {
    pub description: String,
    pub command: String,
}

/// A set of nodes plus the ordered command batch to run on each of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeCommandGroup {
    pub nodes: Vec<String>,
    pub commands: Vec<NodeCommand>,
}

/// Workload kinds the workload collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    Job,
}

impl WorkloadKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
            Self::Job => "Job",
        }
    }
}

/// A watched workload entry in a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    /// Regular expression applied to tail logs; absent means match-all
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// Per-cluster inspection configuration inside a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub cluster_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub workloads: Vec<WorkloadRef>,
    #[serde(default)]
    pub node_groups: Vec<NodeCommandGroup>,
    #[serde(default)]
    pub check_namespaces: bool,
    #[serde(default)]
    pub check_services: bool,
    #[serde(default)]
    pub check_ingresses: bool,
}

/// Per-cluster configuration list describing what to inspect and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

/// Result of one agent command, as returned by the in-cluster agent.
///
/// Exactly one of `response` and `error` is populated; a non-zero exit puts
/// the last output line into `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The five allocatable-utilization ratios for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub limits_cpu: f64,
    pub limits_memory: f64,
    pub requests_cpu: f64,
    pub requests_memory: f64,
    pub requests_pods: f64,
}

/// Inspected node: utilization ratios plus agent command results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub usage: NodeUsage,
    #[serde(default)]
    pub commands: Vec<CommandResult>,
}

/// Tail-log excerpt for one pod of a workload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodLogs {
    pub name: String,
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Condition copied off a workload's status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadCondition {
    pub condition_type: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Availability summary for a workload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadStatus {
    /// "Available" or "Unavailable"
    pub state: String,
    #[serde(default)]
    pub conditions: Vec<WorkloadCondition>,
}

/// One inspected workload with its pods and tail logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadInstance {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub pods: Vec<PodLogs>,
}

/// Object counts for one namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceInventory {
    pub name: String,
    pub pods: usize,
    pub services: usize,
    pub deployments: usize,
    pub replica_sets: usize,
    pub stateful_sets: usize,
    pub daemon_sets: usize,
    pub jobs: usize,
    pub secrets: usize,
    pub config_maps: usize,
    pub resource_quotas: usize,
}

impl NamespaceInventory {
    /// Sum of all counted objects excluding resource quotas.
    #[must_use]
    pub fn object_total(&self) -> usize {
        self.pods
            + self.services
            + self.deployments
            + self.replica_sets
            + self.stateful_sets
            + self.daemon_sets
            + self.jobs
            + self.secrets
            + self.config_maps
    }
}

/// Endpoints summary for one service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    pub name: String,
    pub namespace: String,
    pub has_endpoints: bool,
    pub subsets: usize,
}

/// One ingress object with its duplicate-path marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressEntry {
    pub name: String,
    pub namespace: String,
    pub duplicate_path: bool,
}

/// Inventory of everything the resource collectors looked at in one cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceInventory {
    #[serde(default)]
    pub workloads: Vec<WorkloadInstance>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceInventory>,
    #[serde(default)]
    pub services: Vec<ServiceEndpoints>,
    #[serde(default)]
    pub ingresses: Vec<IngressEntry>,
}

/// Report subsections for one inspected cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSection {
    pub cluster_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub core_findings: Vec<Finding>,
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
    #[serde(default)]
    pub node_findings: Vec<Finding>,
    pub resources: ResourceInventory,
    #[serde(default)]
    pub resource_findings: Vec<Finding>,
}

/// Global header block of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalBlock {
    pub name: String,
    pub rating: String,
    pub timestamp: DateTime<Utc>,
}

/// Assembled inspection report. Cluster order follows template iteration and
/// is not stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub global: GlobalBlock,
    #[serde(default)]
    pub clusters: Vec<ClusterSection>,
}

impl Report {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            global: GlobalBlock {
                name: name.into(),
                // Rating aggregation rules are not settled yet.
                rating: String::new(),
                timestamp: Utc::now(),
            },
            clusters: Vec::new(),
        }
    }
}

/// One persisted execution instance of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub task_id: String,
    pub state: TaskState,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub rating: String,
}

impl Record {
    /// A freshly started record for one run of `task_id`.
    #[must_use]
    pub fn started(task_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            state: TaskState::Running,
            start_time: Utc::now(),
            end_time: None,
            report_id: None,
            rating: String::new(),
        }
    }
}
