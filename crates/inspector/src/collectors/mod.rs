//! Per-resource-kind data collection.
//!
//! Each collector queries one cluster capability and returns a pair of
//! (domain inventory, findings). Business-rule violations become findings,
//! never errors; collaborator failures propagate and abort the run.

pub mod ingress;
pub mod namespace;
pub mod node;
pub mod service;
pub mod workload;
