//! Inspection orchestrator: one run, one report, or nothing at all.
//!
//! A run walks the template's enabled clusters sequentially, fans out only
//! inside the workload collector's log phase, merges alert findings and
//! persists the assembled report. Any step's error aborts the whole run and
//! discards everything built so far; there is no checkpoint and no retry.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::alerts::{AlertMap, AlertSource};
use crate::cluster::{CapabilityProvider, ClusterCapability};
use crate::collectors::{ingress, namespace, node, service, workload};
use crate::config::InspectorConfig;
use crate::models::{ClusterConfig, ClusterSection, Record, Report, ResourceInventory, TaskState};
use crate::notify::Notifier;
use crate::store::Store;

/// Sequences collectors per enabled cluster and assembles the report.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    clusters: Arc<dyn CapabilityProvider>,
    alerts: Arc<dyn AlertSource>,
    notifier: Arc<dyn Notifier>,
    config: InspectorConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        clusters: Arc<dyn CapabilityProvider>,
        alerts: Arc<dyn AlertSource>,
        notifier: Arc<dyn Notifier>,
        config: InspectorConfig,
    ) -> Self {
        Self {
            store,
            clusters,
            alerts,
            notifier,
            config,
        }
    }

    /// Execute one inspection run for `task_id`.
    ///
    /// # Errors
    /// Any collaborator or collector failure aborts the run; the caller (the
    /// scheduling engine) marks the task Failed with the error text. No
    /// partially assembled report is ever persisted.
    pub async fn run(&self, task_id: &str) -> Result<()> {
        let mut record = Record::started(task_id);
        self.store
            .create_record(&record)
            .await
            .context("Failed to persist run record")?;

        let mut task = self.store.get_task(task_id).await?;
        task.state = TaskState::Running;
        task.error = None;
        self.store
            .update_task(&task)
            .await
            .context("Failed to mark task running")?;

        let template = self
            .store
            .get_template(&task.template_id)
            .await
            .with_context(|| format!("Failed to load template {}", task.template_id))?;

        let capabilities = self
            .clusters
            .capabilities()
            .await
            .context("Failed to obtain cluster capabilities")?;

        let alert_map = self.alerts.fetch().await.context("Failed to fetch alerts")?;

        let mut report = Report::new(&template.name);
        for capability in &capabilities {
            let Some(entry) = template
                .clusters
                .iter()
                .find(|c| c.enabled && c.cluster_id == capability.cluster_id())
            else {
                debug!(
                    cluster = capability.cluster_id(),
                    "No enabled template entry, skipping cluster"
                );
                continue;
            };

            let section = self
                .inspect_cluster(capability.as_ref(), entry, &alert_map)
                .await
                .with_context(|| format!("Inspection failed for cluster {}", entry.cluster_id))?;
            report.clusters.push(section);
        }

        self.store
            .create_report(&report)
            .await
            .context("Failed to persist report")?;

        if let Some(target) = &task.notify {
            let file_name = format!("inspection-{}.pdf", report.id);
            let file_path = format!("/tmp/{file_name}");
            self.notifier
                .notify(
                    &target.app_id,
                    &target.app_secret,
                    &file_name,
                    &file_path,
                    &report.global.name,
                )
                .await
                .context("Failed to dispatch notification")?;
        }

        task.report_id = Some(report.id.clone());
        self.store
            .update_task(&task)
            .await
            .context("Failed to attach report to task")?;

        record.state = TaskState::Completed;
        record.end_time = Some(Utc::now());
        record.report_id = Some(report.id.clone());
        record.rating = report.global.rating.clone();
        self.store
            .update_record(&record)
            .await
            .context("Failed to close run record")?;

        info!(
            task = task_id,
            report = %report.id,
            clusters = report.clusters.len(),
            "Inspection run completed"
        );
        Ok(())
    }

    /// Run the collector sequence for one cluster and merge its alert
    /// buckets.
    async fn inspect_cluster(
        &self,
        capability: &dyn ClusterCapability,
        entry: &ClusterConfig,
        alerts: &AlertMap,
    ) -> Result<ClusterSection> {
        let (nodes, mut node_findings) =
            node::collect(capability, &self.config, &entry.node_groups).await?;

        let (workloads, mut resource_findings) =
            workload::collect(capability, &entry.workloads).await?;

        let mut resources = ResourceInventory {
            workloads,
            ..ResourceInventory::default()
        };

        if entry.check_namespaces {
            let (inventories, findings) = namespace::collect(capability).await?;
            resources.namespaces = inventories;
            resource_findings.extend(findings);
        }
        if entry.check_services {
            let (services, findings) = service::collect(capability).await?;
            resources.services = services;
            resource_findings.extend(findings);
        }
        if entry.check_ingresses {
            let (ingresses, findings) = ingress::collect(capability).await?;
            resources.ingresses = ingresses;
            resource_findings.extend(findings);
        }

        let mut core_findings = Vec::new();
        if let Some(buckets) = alerts.get(capability.cluster_id()) {
            core_findings.extend(buckets.cluster.iter().cloned());
            node_findings.extend(buckets.node.iter().cloned());
            resource_findings.extend(buckets.resource.iter().cloned());
        }

        Ok(ClusterSection {
            cluster_id: entry.cluster_id.clone(),
            cluster_name: entry.cluster_name.clone(),
            core_findings,
            nodes,
            node_findings,
            resources,
            resource_findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::StaticProvider;
    use crate::models::{Finding, Severity, Task, Trigger, WorkloadKind, WorkloadRef};
    use crate::store::MemoryStore;
    use crate::test_support::{
        deployment, template_for, FakeAlertSource, FakeCapability, FakeNotifier,
    };

    fn task(id: &str, template_id: &str) -> Task {
        Task {
            id: id.to_string(),
            name: "nightly".to_string(),
            trigger: Trigger::RecurringCron("0 0 2 * * *".to_string()),
            state: TaskState::Scheduled,
            template_id: template_id.to_string(),
            notify: None,
            report_id: None,
            error: None,
        }
    }

    fn orchestrator_with(
        store: Arc<MemoryStore>,
        capability: FakeCapability,
        alerts: FakeAlertSource,
    ) -> Orchestrator {
        Orchestrator::new(
            store,
            Arc::new(StaticProvider::new(vec![Arc::new(capability)])),
            Arc::new(alerts),
            Arc::new(FakeNotifier::default()),
            InspectorConfig::default(),
        )
    }

    #[tokio::test]
    async fn under_replicated_deployment_yields_one_medium_finding() {
        let store = Arc::new(MemoryStore::new());
        let mut template = template_for("tpl", "c1", "prod-east");
        template.clusters[0].workloads = vec![WorkloadRef {
            kind: WorkloadKind::Deployment,
            name: "api".to_string(),
            namespace: "default".to_string(),
            log_filter: None,
        }];
        store.put_template(template).await;
        store.put_task(task("t1", "tpl")).await;

        let mut cap = FakeCapability::new("c1", "prod-east");
        cap.deployments.insert(
            ("default".to_string(), "api".to_string()),
            deployment("api", "default", 3, 2),
        );

        let orch = orchestrator_with(store.clone(), cap, FakeAlertSource::default());
        orch.run("t1").await.unwrap();

        let report_id = store.get_task("t1").await.unwrap().report_id.unwrap();
        let report = store.report(&report_id).await.unwrap();
        assert_eq!(report.clusters.len(), 1);

        let findings = &report.clusters[0].resource_findings;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].title.contains("default/api"));
    }

    #[tokio::test]
    async fn collector_failure_discards_the_whole_report() {
        let store = Arc::new(MemoryStore::new());
        let mut template = template_for("tpl", "c1", "prod-east");
        template.clusters[0].check_namespaces = true;
        store.put_template(template).await;
        store.put_task(task("t1", "tpl")).await;

        let mut cap = FakeCapability::new("c1", "prod-east");
        cap.namespaces = vec!["default".to_string()];
        cap.count_error = Some("connection refused".to_string());

        let orch = orchestrator_with(store.clone(), cap, FakeAlertSource::default());
        let err = orch.run("t1").await.unwrap_err();
        assert!(format!("{err:#}").contains("connection refused"));
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn alert_fetch_failure_aborts_before_any_collection() {
        let store = Arc::new(MemoryStore::new());
        store.put_template(template_for("tpl", "c1", "prod")).await;
        store.put_task(task("t1", "tpl")).await;

        let mut alerts = FakeAlertSource::default();
        alerts.error = Some("no rule groups".to_string());

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            alerts,
        );
        assert!(orch.run("t1").await.is_err());
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn alert_buckets_merge_into_matching_sections() {
        let store = Arc::new(MemoryStore::new());
        store.put_template(template_for("tpl", "c1", "prod")).await;
        store.put_task(task("t1", "tpl")).await;

        let mut alerts = FakeAlertSource::default();
        let buckets = alerts.buckets.entry("c1".to_string()).or_default();
        buckets.cluster.push(Finding::new("EtcdDown", "down", Severity::High));
        buckets.node.push(Finding::new("HighLoad [w1]", "load", Severity::Medium));
        buckets.resource.push(Finding::new("PodCrash", "crash", Severity::Medium));

        let orch = orchestrator_with(store.clone(), FakeCapability::new("c1", "prod"), alerts);
        orch.run("t1").await.unwrap();

        let report_id = store.get_task("t1").await.unwrap().report_id.unwrap();
        let report = store.report(&report_id).await.unwrap();
        let section = &report.clusters[0];
        assert_eq!(section.core_findings.len(), 1);
        assert_eq!(section.node_findings.len(), 1);
        assert_eq!(section.resource_findings.len(), 1);
    }

    #[tokio::test]
    async fn disabled_cluster_entries_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut template = template_for("tpl", "c1", "prod");
        template.clusters[0].enabled = false;
        store.put_template(template).await;
        store.put_task(task("t1", "tpl")).await;

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            FakeAlertSource::default(),
        );
        orch.run("t1").await.unwrap();

        let report_id = store.get_task("t1").await.unwrap().report_id.unwrap();
        let report = store.report(&report_id).await.unwrap();
        assert!(report.clusters.is_empty());
    }

    #[tokio::test]
    async fn missing_template_aborts_the_run() {
        let store = Arc::new(MemoryStore::new());
        store.put_task(task("t1", "absent")).await;

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            FakeAlertSource::default(),
        );
        assert!(orch.run("t1").await.is_err());
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn record_is_closed_with_report_id_on_success() {
        let store = Arc::new(MemoryStore::new());
        store.put_template(template_for("tpl", "c1", "prod")).await;
        store.put_task(task("t1", "tpl")).await;

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            FakeAlertSource::default(),
        );
        orch.run("t1").await.unwrap();

        let records = store.records_for_task("t1").await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.state, TaskState::Completed);
        assert!(record.end_time.is_some());
        assert_eq!(
            record.report_id,
            store.get_task("t1").await.unwrap().report_id
        );
    }

    #[tokio::test]
    async fn report_rating_is_unset_pending_aggregation_rules() {
        // The rating field is intentionally the zero value until the
        // aggregation formula is confirmed against real requirements.
        let store = Arc::new(MemoryStore::new());
        store.put_template(template_for("tpl", "c1", "prod")).await;
        store.put_task(task("t1", "tpl")).await;

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            FakeAlertSource::default(),
        );
        orch.run("t1").await.unwrap();

        let report_id = store.get_task("t1").await.unwrap().report_id.unwrap();
        assert_eq!(store.report(&report_id).await.unwrap().global.rating, "");
    }

    #[tokio::test]
    async fn notify_target_triggers_dispatch() {
        let store = Arc::new(MemoryStore::new());
        store.put_template(template_for("tpl", "c1", "prod")).await;
        let mut t = task("t1", "tpl");
        t.notify = Some(crate::models::NotifyTarget {
            app_id: "app".to_string(),
            app_secret: "secret".to_string(),
        });
        store.put_task(t).await;

        let notifier = Arc::new(FakeNotifier::default());
        let orch = Orchestrator::new(
            store.clone(),
            Arc::new(StaticProvider::new(vec![Arc::new(FakeCapability::new(
                "c1", "prod",
            ))])),
            Arc::new(FakeAlertSource::default()),
            notifier.clone(),
            InspectorConfig::default(),
        );
        orch.run("t1").await.unwrap();
        assert_eq!(notifier.sent(), 1);
    }

    #[tokio::test]
    async fn template_without_matching_capability_yields_empty_report() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_template(template_for("tpl", "other-cluster", "x"))
            .await;
        store.put_task(task("t1", "tpl")).await;

        let orch = orchestrator_with(
            store.clone(),
            FakeCapability::new("c1", "prod"),
            FakeAlertSource::default(),
        );
        orch.run("t1").await.unwrap();
        let report_id = store.get_task("t1").await.unwrap().report_id.unwrap();
        assert!(store.report(&report_id).await.unwrap().clusters.is_empty());
    }
}
