//! Persistence seam for tasks, templates, records and reports.
//!
//! The relational store is an external collaborator; this module defines the
//! CRUD surface the pipeline needs plus an in-memory implementation used for
//! wiring and tests. Nested Template/Report payloads are opaque serialized
//! blobs to any real store, so the trait only moves whole values.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{Record, Report, Task, Template};

/// CRUD calls the scheduling engine and orchestrator issue against the store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a freshly started record.
    async fn create_record(&self, record: &Record) -> Result<()>;

    /// Persist an updated record (end time, rating, report id).
    async fn update_record(&self, record: &Record) -> Result<()>;

    /// Fetch a task by id.
    async fn get_task(&self, id: &str) -> Result<Task>;

    /// Persist an updated task (state transitions, error text).
    async fn update_task(&self, task: &Task) -> Result<()>;

    /// Fetch a template by id.
    async fn get_template(&self, id: &str) -> Result<Template>;

    /// Persist a fully assembled report.
    async fn create_report(&self, report: &Report) -> Result<()>;
}

/// In-memory store backed by per-entity maps.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<String, Task>>,
    templates: RwLock<HashMap<String, Template>>,
    records: RwLock<HashMap<String, Record>>,
    reports: RwLock<HashMap<String, Report>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task.
    pub async fn put_task(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Seed a template.
    pub async fn put_template(&self, template: Template) {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template);
    }

    /// Fetch a record by id.
    pub async fn record(&self, id: &str) -> Option<Record> {
        self.records.read().await.get(id).cloned()
    }

    /// All records for a task, unordered.
    pub async fn records_for_task(&self, task_id: &str) -> Vec<Record> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Fetch a report by id.
    pub async fn report(&self, id: &str) -> Option<Report> {
        self.reports.read().await.get(id).cloned()
    }

    /// Number of persisted reports.
    pub async fn report_count(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_record(&self, record: &Record) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_record(&self, record: &Record) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("task {id} not found"))
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_template(&self, id: &str) -> Result<Template> {
        self.templates
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("template {id} not found"))
    }

    async fn create_report(&self, report: &Report) -> Result<()> {
        self.reports
            .write()
            .await
            .insert(report.id.clone(), report.clone());
        Ok(())
    }
}
