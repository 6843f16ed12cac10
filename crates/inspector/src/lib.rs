//! Scheduled health inspections of externally managed Kubernetes clusters.
//!
//! The pipeline: a [`scheduler::Scheduler`] owns time-based triggers (one-shot
//! timers and recurring cron entries) and dispatches detached runs of the
//! [`orchestrator::Orchestrator`], which fans out per-cluster collectors,
//! merges the external alert feed and persists one consistent report, or
//! nothing at all.
//!
//! HTTP routing, the relational store, kubeconfig provisioning, report
//! rendering and chat delivery are external collaborators reached through
//! the traits in [`store`], [`cluster`], [`alerts`] and [`notify`].

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod alerts;
pub mod cluster;
pub mod collectors;
pub mod config;
pub mod error;
pub mod exec;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::InspectorConfig;
pub use error::CapabilityError;
pub use models::{Finding, Report, Severity, Task, TaskState, Template, Trigger};
pub use orchestrator::Orchestrator;
pub use scheduler::Scheduler;
