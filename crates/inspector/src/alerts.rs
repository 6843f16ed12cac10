//! Alert merger: polls the alerting backend's rule-evaluation endpoint and
//! classifies firing/pending alerts into per-cluster finding buckets.
//!
//! Reference: `GET <base>/api/v1/rules` returning
//! `{data:{groups:[{name, rules:[{alerts:[{state, labels, annotations}]}]}]}}`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{Finding, Severity};

/// Rule group whose alerts become cluster-level findings.
const GROUP_CLUSTER: &str = "inspection-cluster";
/// Rule group whose alerts become node-level findings.
const GROUP_NODE: &str = "inspection-node";
/// Rule group whose alerts become resource-level findings.
const GROUP_RESOURCE: &str = "inspection-resource";

/// Label naming the origin cluster of an alert.
const LABEL_ORIGIN: &str = "prometheus_from";

#[derive(Debug, Deserialize)]
struct RulesResponse {
    data: RulesData,
}

#[derive(Debug, Deserialize)]
struct RulesData {
    #[serde(default)]
    groups: Vec<RuleGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Rule {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Alert {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Alert {
    fn is_active(&self) -> bool {
        self.state == "firing" || self.state == "pending"
    }

    fn severity(&self) -> Severity {
        match self.labels.get("severity").map(String::as_str) {
            Some("critical") => Severity::High,
            Some("info") => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

/// The three finding buckets for one origin cluster.
#[derive(Debug, Clone, Default)]
pub struct AlertBuckets {
    pub cluster: Vec<Finding>,
    pub node: Vec<Finding>,
    pub resource: Vec<Finding>,
}

/// Findings keyed by origin-cluster identifier.
pub type AlertMap = HashMap<String, AlertBuckets>;

/// Source of classified alert findings.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetch and classify the current alert set.
    ///
    /// An unreachable backend or an empty rule set is a hard error; the
    /// caller must not fall back to "no alerts".
    async fn fetch(&self) -> Result<AlertMap>;
}

/// Classify rule groups into per-cluster buckets.
///
/// Alerts missing a required label or annotation are logged and skipped.
pub(crate) fn classify(groups: Vec<RuleGroup>) -> AlertMap {
    let mut map = AlertMap::new();

    for group in groups {
        for alert in group
            .rules
            .into_iter()
            .flat_map(|r| r.alerts)
            .filter(Alert::is_active)
        {
            let Some(origin) = alert.labels.get(LABEL_ORIGIN) else {
                warn!(group = %group.name, "Skipping alert without {LABEL_ORIGIN} label");
                continue;
            };
            let Some(name) = alert.labels.get("alertname") else {
                warn!(group = %group.name, "Skipping alert without alertname label");
                continue;
            };
            let Some(summary) = alert.annotations.get("summary") else {
                warn!(group = %group.name, alert = %name, "Skipping alert without summary annotation");
                continue;
            };

            let severity = alert.severity();
            let buckets = map.entry(origin.clone()).or_default();

            match group.name.as_str() {
                GROUP_CLUSTER => buckets
                    .cluster
                    .push(Finding::new(name, summary, severity)),
                GROUP_NODE => {
                    let Some(instance) = alert.labels.get("instance") else {
                        warn!(alert = %name, "Skipping node alert without instance label");
                        continue;
                    };
                    let host = instance.split(':').next().unwrap_or(instance);
                    buckets.node.push(Finding::new(
                        format!("{name} [{host}]"),
                        summary,
                        severity,
                    ));
                }
                GROUP_RESOURCE => buckets
                    .resource
                    .push(Finding::new(name, summary, severity)),
                other => {
                    debug!(group = %other, "Ignoring rule group outside the inspection set");
                }
            }
        }
    }

    map
}

/// Alert source backed by the backend's HTTP rules endpoint.
///
/// Certificate validation is disabled on this client only: the backend sits
/// behind in-cluster self-signed certificates.
pub struct HttpAlertSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAlertSource {
    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl AlertSource for HttpAlertSource {
    async fn fetch(&self) -> Result<AlertMap> {
        let url = format!("{}/api/v1/rules", self.base_url.trim_end_matches('/'));

        debug!(url = %url, "Fetching alert rules");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach alerting backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("alerting backend returned {status}: {body}");
        }

        let rules: RulesResponse = response
            .json()
            .await
            .context("Failed to parse rules response")?;

        if rules.data.groups.is_empty() {
            bail!("alerting backend returned no rule groups");
        }

        Ok(classify(rules.data.groups))
    }
}
