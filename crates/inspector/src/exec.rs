//! Remote command execution inside a target cluster's agent pod.
//!
//! The agent contract: it is invoked with an ordered list of
//! `"description:shell-command"` arguments and prints a JSON array of
//! per-command results on stdout. A non-zero exit of an individual command
//! puts the last output line into `error` instead of `response`.

use tracing::debug;

use crate::cluster::ClusterCapability;
use crate::config::InspectorConfig;
use crate::error::CapabilityError;
use crate::models::{CommandResult, NodeCommand};

/// Runs command batches through an agent pod's exec stream.
pub struct RemoteExecutor<'a> {
    config: &'a InspectorConfig,
}

impl<'a> RemoteExecutor<'a> {
    #[must_use]
    pub fn new(config: &'a InspectorConfig) -> Self {
        Self { config }
    }

    /// Run `commands` inside the agent container of `pod` and parse the
    /// agent's JSON output.
    ///
    /// Blocks until the exec stream closes; there is no timeout and no retry.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be opened, the transport fails,
    /// or the agent output is not valid JSON.
    pub async fn run_batch(
        &self,
        capability: &dyn ClusterCapability,
        pod: &str,
        commands: &[NodeCommand],
    ) -> Result<Vec<CommandResult>, CapabilityError> {
        let mut argv = Vec::with_capacity(commands.len() + 1);
        argv.push(self.config.agent_binary.clone());
        argv.extend(
            commands
                .iter()
                .map(|c| format!("{}:{}", c.description, c.command)),
        );

        debug!(
            cluster = capability.cluster_id(),
            pod,
            batch = commands.len(),
            "Executing command batch in agent pod"
        );

        let output = capability
            .exec(
                &self.config.agent_namespace,
                pod,
                &self.config.agent_container,
                argv,
            )
            .await?;

        let results: Vec<CommandResult> = serde_json::from_str(output.stdout.trim())?;
        Ok(results)
    }
}
