//! Cluster capability seam.
//!
//! A capability is an authenticated handle through which list/get/logs/exec
//! operations are issued against one target cluster. Collectors only ever see
//! the [`ClusterCapability`] trait; [`KubeCapability`] is the production
//! implementation over a `kube::Client`. Kubeconfig provisioning and
//! credential management happen outside this crate.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, Pod, ResourceQuota, Secret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, AttachParams, ListParams, LogParams};
use kube::Client;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::error::CapabilityError;

/// Object kinds counted by the namespace collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountedKind {
    Pods,
    Services,
    Deployments,
    ReplicaSets,
    StatefulSets,
    DaemonSets,
    Jobs,
    Secrets,
    ConfigMaps,
    ResourceQuotas,
}

/// All kinds the namespace collector tallies, in report order.
pub const COUNTED_KINDS: [CountedKind; 10] = [
    CountedKind::Pods,
    CountedKind::Services,
    CountedKind::Deployments,
    CountedKind::ReplicaSets,
    CountedKind::StatefulSets,
    CountedKind::DaemonSets,
    CountedKind::Jobs,
    CountedKind::Secrets,
    CountedKind::ConfigMaps,
    CountedKind::ResourceQuotas,
];

/// Captured output of one exec stream.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Typed list/get/logs/exec surface against one cluster.
///
/// `get_*` methods return `Ok(None)` for missing objects; every other error
/// propagates unchanged.
#[async_trait]
pub trait ClusterCapability: Send + Sync {
    fn cluster_id(&self) -> &str;

    fn cluster_name(&self) -> &str;

    /// List pods, optionally narrowed by namespace, label selector and field
    /// selector. A `None` namespace lists cluster-wide.
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>, CapabilityError>;

    async fn get_node(&self, name: &str) -> Result<Option<Node>, CapabilityError>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, CapabilityError>;

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, CapabilityError>;

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, CapabilityError>;

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, CapabilityError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, CapabilityError>;

    /// Count objects of one kind in a namespace.
    async fn count_objects(
        &self,
        kind: CountedKind,
        namespace: &str,
    ) -> Result<usize, CapabilityError>;

    /// List services cluster-wide.
    async fn list_services(&self) -> Result<Vec<Service>, CapabilityError>;

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, CapabilityError>;

    /// List ingresses cluster-wide.
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, CapabilityError>;

    /// Fetch the last `lines` log lines of a pod.
    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        lines: i64,
    ) -> Result<String, CapabilityError>;

    /// Open an exec stream into `container` of `pod` and run `command` to
    /// completion. No timeout is applied; the call returns when the stream
    /// closes or the transport errors.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: Vec<String>,
    ) -> Result<ExecOutput, CapabilityError>;
}

/// Yields one capability per cluster known to the control plane.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// A failure for any single cluster fails the whole call; the
    /// orchestrator never works with a partial set.
    async fn capabilities(&self) -> anyhow::Result<Vec<Arc<dyn ClusterCapability>>>;
}

/// Fixed list of capabilities, used when the cluster set is wired up front.
pub struct StaticProvider {
    capabilities: Vec<Arc<dyn ClusterCapability>>,
}

impl StaticProvider {
    #[must_use]
    pub fn new(capabilities: Vec<Arc<dyn ClusterCapability>>) -> Self {
        Self { capabilities }
    }
}

#[async_trait]
impl CapabilityProvider for StaticProvider {
    async fn capabilities(&self) -> anyhow::Result<Vec<Arc<dyn ClusterCapability>>> {
        Ok(self.capabilities.clone())
    }
}

/// Map a kube get result so that 404 becomes `Ok(None)`.
fn ok_or_not_found<T>(result: kube::Result<T>) -> Result<Option<T>, CapabilityError> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read an optional attached stream to the end.
async fn drain_stream(
    stream: Option<impl tokio::io::AsyncRead + Unpin>,
) -> Result<String, CapabilityError> {
    let mut out = String::new();
    if let Some(mut stream) = stream {
        stream
            .read_to_string(&mut out)
            .await
            .map_err(|e| CapabilityError::Exec(e.to_string()))?;
    }
    Ok(out)
}

/// Production capability over a `kube::Client`.
#[derive(Clone)]
pub struct KubeCapability {
    id: String,
    name: String,
    client: Client,
}

impl KubeCapability {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, client: Client) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            client,
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn count_list<K>(&self, namespace: &str) -> Result<usize, CapabilityError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.len())
    }
}

#[async_trait]
impl ClusterCapability for KubeCapability {
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
        let api: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(labels) = label_selector {
            params = params.labels(labels);
        }
        if let Some(fields) = field_selector {
            params = params.fields(fields);
        }
        Ok(api.list(&params).await?.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, CapabilityError> {
        let api: Api<Node> = Api::all(self.client.clone());
        ok_or_not_found(api.get(name).await)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, CapabilityError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        ok_or_not_found(api.get(name).await)
    }

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, CapabilityError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        ok_or_not_found(api.get(name).await)
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, CapabilityError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        ok_or_not_found(api.get(name).await)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, CapabilityError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        ok_or_not_found(api.get(name).await)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, CapabilityError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn count_objects(
        &self,
        kind: CountedKind,
        namespace: &str,
    ) -> Result<usize, CapabilityError> {
        match kind {
            CountedKind::Pods => self.count_list::<Pod>(namespace).await,
            CountedKind::Services => self.count_list::<Service>(namespace).await,
            CountedKind::Deployments => self.count_list::<Deployment>(namespace).await,
            CountedKind::ReplicaSets => self.count_list::<ReplicaSet>(namespace).await,
            CountedKind::StatefulSets => self.count_list::<StatefulSet>(namespace).await,
            CountedKind::DaemonSets => self.count_list::<DaemonSet>(namespace).await,
            CountedKind::Jobs => self.count_list::<Job>(namespace).await,
            CountedKind::Secrets => self.count_list::<Secret>(namespace).await,
            CountedKind::ConfigMaps => self.count_list::<ConfigMap>(namespace).await,
            CountedKind::ResourceQuotas => self.count_list::<ResourceQuota>(namespace).await,
        }
    }

    async fn list_services(&self) -> Result<Vec<Service>, CapabilityError> {
        let api: Api<Service> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, CapabilityError> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        ok_or_not_found(api.get(name).await)
    }

    async fn list_ingresses(&self) -> Result<Vec<Ingress>, CapabilityError> {
        let api: Api<Ingress> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        lines: i64,
    ) -> Result<String, CapabilityError> {
        let params = LogParams {
            tail_lines: Some(lines),
            ..LogParams::default()
        };
        Ok(self.pods(namespace).logs(pod, &params).await?)
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: Vec<String>,
    ) -> Result<ExecOutput, CapabilityError> {
        let params = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);

        let mut attached = self.pods(namespace).exec(pod, command, &params).await?;

        let stdout_stream = attached.stdout();
        let stderr_stream = attached.stderr();
        let (stdout, stderr) =
            tokio::join!(drain_stream(stdout_stream), drain_stream(stderr_stream));
        let output = ExecOutput {
            stdout: stdout?,
            stderr: stderr?,
        };

        attached
            .join()
            .await
            .map_err(|e| CapabilityError::Exec(e.to_string()))?;

        Ok(output)
    }
}
