//! Runtime configuration for the inspection pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default alerting backend URL (internal Kubernetes DNS)
const DEFAULT_ALERTS_URL: &str = "https://prometheus-server.observability.svc.cluster.local";

/// Configuration for one inspector instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Base URL of the alerting backend; `/api/v1/rules` is appended
    pub alerts_base_url: String,
    /// Namespace the agent daemonset runs in
    pub agent_namespace: String,
    /// Label selector that identifies agent pods
    pub agent_selector: String,
    /// Container inside the agent pod to exec into
    pub agent_container: String,
    /// Agent binary invoked with the command batch as arguments
    pub agent_binary: String,
    /// Name used for the capability of the local cluster
    pub cluster_name: String,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            alerts_base_url: std::env::var("INSPECTOR_ALERTS_URL")
                .unwrap_or_else(|_| DEFAULT_ALERTS_URL.to_string()),
            agent_namespace: std::env::var("INSPECTOR_AGENT_NAMESPACE")
                .unwrap_or_else(|_| "inspector".to_string()),
            agent_selector: std::env::var("INSPECTOR_AGENT_SELECTOR")
                .unwrap_or_else(|_| "app=inspector-agent".to_string()),
            agent_container: std::env::var("INSPECTOR_AGENT_CONTAINER")
                .unwrap_or_else(|_| "agent".to_string()),
            agent_binary: std::env::var("INSPECTOR_AGENT_BINARY")
                .unwrap_or_else(|_| "/usr/local/bin/inspector-agent".to_string()),
            cluster_name: std::env::var("INSPECTOR_CLUSTER_NAME")
                .unwrap_or_else(|_| "local".to_string()),
        }
    }
}

impl InspectorConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// absent fields.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
