//! Error types for cluster capability operations.

use thiserror::Error;

/// Errors surfaced by a cluster capability.
///
/// Not-found lookups are not errors at this seam: the typed `get_*` methods
/// return `Ok(None)` so collectors can treat missing objects as benign skips
/// without inspecting API status codes.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Kubernetes API call failed
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Exec stream into the agent pod failed
    #[error("exec stream failed: {0}")]
    Exec(String),

    /// Agent returned output that does not parse as command results
    #[error("malformed agent output: {0}")]
    AgentOutput(#[from] serde_json::Error),
}
