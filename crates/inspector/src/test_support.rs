//! Shared fakes and object builders for the test suites.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{
    DaemonSet, Deployment, DeploymentSpec, DeploymentStatus, StatefulSet,
};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    Container, Endpoints, EndpointSubset, Namespace, Node, NodeStatus, Pod, PodSpec,
    ResourceRequirements, Service,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressRule, IngressSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::alerts::{AlertMap, AlertSource};
use crate::cluster::{ClusterCapability, CountedKind, ExecOutput};
use crate::error::CapabilityError;
use crate::models::{ClusterConfig, Template};
use crate::notify::Notifier;

/// In-memory capability whose contents are plain struct fields.
#[derive(Default)]
pub struct FakeCapability {
    pub id: String,
    pub name: String,
    pub pods: Vec<Pod>,
    pub nodes: HashMap<String, Node>,
    pub deployments: HashMap<(String, String), Deployment>,
    pub daemon_sets: HashMap<(String, String), DaemonSet>,
    pub stateful_sets: HashMap<(String, String), StatefulSet>,
    pub jobs: HashMap<(String, String), Job>,
    pub namespaces: Vec<String>,
    pub counts: HashMap<(String, CountedKind), usize>,
    /// When set, every count call fails with this message
    pub count_error: Option<String>,
    pub services: Vec<Service>,
    pub endpoints: HashMap<(String, String), Endpoints>,
    pub ingresses: Vec<Ingress>,
    /// Raw log text per pod name
    pub logs: HashMap<String, String>,
    /// Pod names whose log fetch fails
    pub failing_logs: HashSet<String>,
    /// What the agent prints on stdout for any exec
    pub exec_stdout: String,
}

impl FakeCapability {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }
}

fn matches_labels(pod: &Pod, selector: &str) -> bool {
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    selector.split(',').all(|pair| {
        pair.split_once('=')
            .is_some_and(|(k, v)| labels.get(k).map(String::as_str) == Some(v))
    })
}

fn matches_fields(pod: &Pod, selector: &str) -> bool {
    selector.split(',').all(|pair| match pair.split_once('=') {
        Some(("spec.nodeName", v)) => {
            pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) == Some(v)
        }
        _ => true,
    })
}

#[async_trait]
impl ClusterCapability for FakeCapability {
    fn cluster_id(&self) -> &str {
        &self.id
    }

    fn cluster_name(&self) -> &str {
        &self.name
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>, CapabilityError> {
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.is_none() || p.metadata.namespace.as_deref() == namespace)
            .filter(|p| label_selector.map_or(true, |s| matches_labels(p, s)))
            .filter(|p| field_selector.map_or(true, |s| matches_fields(p, s)))
            .cloned()
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, CapabilityError> {
        Ok(self.nodes.get(name).cloned())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, CapabilityError> {
        Ok(self
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, CapabilityError> {
        Ok(self
            .daemon_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, CapabilityError> {
        Ok(self
            .stateful_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, CapabilityError> {
        Ok(self
            .jobs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, CapabilityError> {
        Ok(self
            .namespaces
            .iter()
            .map(|name| Namespace {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    ..ObjectMeta::default()
                },
                ..Namespace::default()
            })
            .collect())
    }

    async fn count_objects(
        &self,
        kind: CountedKind,
        namespace: &str,
    ) -> Result<usize, CapabilityError> {
        if let Some(message) = &self.count_error {
            return Err(CapabilityError::Exec(message.clone()));
        }
        Ok(self
            .counts
            .get(&(namespace.to_string(), kind))
            .copied()
            .unwrap_or(0))
    }

    async fn list_services(&self) -> Result<Vec<Service>, CapabilityError> {
        Ok(self.services.clone())
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, CapabilityError> {
        Ok(self
            .endpoints
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_ingresses(&self) -> Result<Vec<Ingress>, CapabilityError> {
        Ok(self.ingresses.clone())
    }

    async fn tail_logs(
        &self,
        _namespace: &str,
        pod: &str,
        _lines: i64,
    ) -> Result<String, CapabilityError> {
        if self.failing_logs.contains(pod) {
            return Err(CapabilityError::Exec(format!("log stream reset for {pod}")));
        }
        Ok(self.logs.get(pod).cloned().unwrap_or_default())
    }

    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        _container: &str,
        _command: Vec<String>,
    ) -> Result<ExecOutput, CapabilityError> {
        Ok(ExecOutput {
            stdout: self.exec_stdout.clone(),
            stderr: String::new(),
        })
    }
}

/// Alert source returning canned buckets, or a canned error.
#[derive(Default)]
pub struct FakeAlertSource {
    pub buckets: AlertMap,
    pub error: Option<String>,
}

#[async_trait]
impl AlertSource for FakeAlertSource {
    async fn fetch(&self) -> anyhow::Result<AlertMap> {
        match &self.error {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(self.buckets.clone()),
        }
    }
}

/// Notifier that only counts dispatches.
#[derive(Default)]
pub struct FakeNotifier {
    sent: AtomicUsize,
}

impl FakeNotifier {
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(
        &self,
        _app_id: &str,
        _app_secret: &str,
        _file_name: &str,
        _file_path: &str,
        _message: &str,
    ) -> anyhow::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Template with one enabled cluster and all optional checks off.
pub fn template_for(id: &str, cluster_id: &str, cluster_name: &str) -> Template {
    Template {
        id: id.to_string(),
        name: format!("{cluster_name} inspection"),
        clusters: vec![ClusterConfig {
            enabled: true,
            cluster_id: cluster_id.to_string(),
            cluster_name: cluster_name.to_string(),
            ..ClusterConfig::default()
        }],
    }
}

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..ObjectMeta::default()
    }
}

/// Deployment with an `app=<name>` selector and the given replica counts.
pub fn deployment(name: &str, namespace: &str, desired: i32, available: i32) -> Deployment {
    Deployment {
        metadata: meta(name, Some(namespace)),
        spec: Some(DeploymentSpec {
            replicas: Some(desired),
            selector: LabelSelector {
                match_labels: Some(
                    [("app".to_string(), name.to_string())].into_iter().collect(),
                ),
                ..LabelSelector::default()
            },
            ..DeploymentSpec::default()
        }),
        status: Some(DeploymentStatus {
            available_replicas: Some(available),
            ..DeploymentStatus::default()
        }),
    }
}

/// Pod scheduled on `node` carrying the given labels and per-container
/// cpu/memory requests and limits.
pub fn pod(
    name: &str,
    namespace: &str,
    node: &str,
    labels: &[(&str, &str)],
    requests: &[(&str, &str)],
    limits: &[(&str, &str)],
) -> Pod {
    let to_quantities = |pairs: &[(&str, &str)]| -> Option<BTreeMap<String, Quantity>> {
        if pairs.is_empty() {
            None
        } else {
            Some(
                pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), Quantity((*v).to_string())))
                    .collect(),
            )
        }
    };

    let mut metadata = meta(name, Some(namespace));
    if !labels.is_empty() {
        metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
    }

    Pod {
        metadata,
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            containers: vec![Container {
                name: "main".to_string(),
                resources: Some(ResourceRequirements {
                    requests: to_quantities(requests),
                    limits: to_quantities(limits),
                    ..ResourceRequirements::default()
                }),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    }
}

/// Node with the given allocatable quantities.
pub fn node(name: &str, allocatable: &[(&str, &str)]) -> Node {
    Node {
        metadata: meta(name, None),
        spec: None,
        status: Some(NodeStatus {
            allocatable: Some(
                allocatable
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), Quantity((*v).to_string())))
                    .collect(),
            ),
            ..NodeStatus::default()
        }),
    }
}

/// Service named `name` in `namespace`.
pub fn service(name: &str, namespace: &str) -> Service {
    Service {
        metadata: meta(name, Some(namespace)),
        ..Service::default()
    }
}

/// Endpoints object with `subsets` empty subset entries.
pub fn endpoints(name: &str, namespace: &str, subsets: usize) -> Endpoints {
    Endpoints {
        metadata: meta(name, Some(namespace)),
        subsets: if subsets == 0 {
            None
        } else {
            Some(vec![EndpointSubset::default(); subsets])
        },
    }
}

/// Ingress defining one rule per `(host, path)` pair.
pub fn ingress(name: &str, namespace: &str, rules: &[(&str, &str)]) -> Ingress {
    Ingress {
        metadata: meta(name, Some(namespace)),
        spec: Some(IngressSpec {
            rules: Some(
                rules
                    .iter()
                    .map(|(host, path)| IngressRule {
                        host: Some((*host).to_string()),
                        http: Some(HTTPIngressRuleValue {
                            paths: vec![HTTPIngressPath {
                                path: Some((*path).to_string()),
                                ..HTTPIngressPath::default()
                            }],
                        }),
                    })
                    .collect(),
            ),
            ..IngressSpec::default()
        }),
        status: None,
    }
}
