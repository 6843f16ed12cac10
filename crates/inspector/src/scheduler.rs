//! Scheduling engine: time-based triggers for inspection runs.
//!
//! The engine owns a registry mapping task id to trigger handle behind a
//! single lock; callers never touch the map directly. Trigger firings spawn
//! detached runs of the orchestrator, so the engine itself never blocks on
//! an inspection.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{Task, TaskState, Trigger};
use crate::orchestrator::Orchestrator;
use crate::store::Store;

/// Armed trigger for one task.
enum TriggerHandle {
    /// Detached one-shot timer
    Timer(JoinHandle<()>),
    /// Entry id inside the shared cron engine
    Cron(Uuid),
}

/// Owns task triggers and dispatches orchestrator runs when they fire.
pub struct Scheduler {
    registry: Mutex<HashMap<String, TriggerHandle>>,
    cron: JobScheduler,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn Store>,
}

impl Scheduler {
    /// Create the engine and start the shared cron runtime.
    ///
    /// # Errors
    /// Returns an error if the cron engine fails to start.
    pub async fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn Store>) -> Result<Arc<Self>> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("failed to create cron engine: {e}"))?;
        cron.start()
            .await
            .map_err(|e| anyhow!("failed to start cron engine: {e}"))?;

        Ok(Arc::new(Self {
            registry: Mutex::new(HashMap::new()),
            cron,
            orchestrator,
            store,
        }))
    }

    /// Arm the trigger for `task`.
    ///
    /// A fixed-time trigger whose target has already elapsed runs
    /// immediately as a detached task and leaves no registry entry. Re-adding
    /// a task replaces its previous trigger, keeping at most one handle per
    /// task id.
    ///
    /// # Errors
    /// Returns an error if the cron expression is invalid or the cron engine
    /// rejects the entry.
    pub async fn add_schedule(self: &Arc<Self>, task: &Task) -> Result<()> {
        match &task.trigger {
            Trigger::FixedTime(at) => {
                let Ok(delay) = (*at - Utc::now()).to_std() else {
                    info!(task = %task.id, "Fixed-time trigger already elapsed, running now");
                    let engine = Arc::clone(self);
                    let id = task.id.clone();
                    tokio::spawn(async move {
                        engine.execute_task(&id, true).await;
                    });
                    return Ok(());
                };

                let engine = Arc::clone(self);
                let id = task.id.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    engine.execute_task(&id, true).await;
                });
                self.register(&task.id, TriggerHandle::Timer(handle)).await;
            }
            Trigger::RecurringCron(expr) => {
                let engine = Arc::clone(self);
                let id = task.id.clone();
                let job = Job::new_async(expr.as_str(), move |_uuid, _lock| {
                    let engine = Arc::clone(&engine);
                    let id = id.clone();
                    Box::pin(async move {
                        engine.execute_task(&id, false).await;
                    })
                })
                .map_err(|e| anyhow!("invalid cron expression {expr:?}: {e}"))?;

                let entry = self
                    .cron
                    .add(job)
                    .await
                    .map_err(|e| anyhow!("failed to register cron entry: {e}"))?;
                self.register(&task.id, TriggerHandle::Cron(entry)).await;
            }
        }
        Ok(())
    }

    /// Disarm the trigger for `task_id`. Absence is not an error.
    pub async fn remove_schedule(&self, task_id: &str) {
        let handle = self.registry.lock().await.remove(task_id);
        if let Some(handle) = handle {
            self.cancel(task_id, handle).await;
        }
    }

    /// Whether a trigger is currently armed for `task_id`.
    pub async fn is_scheduled(&self, task_id: &str) -> bool {
        self.registry.lock().await.contains_key(task_id)
    }

    /// Number of armed triggers.
    pub async fn scheduled_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Run the orchestrator for one firing.
    ///
    /// On failure the task is marked Failed with the raw error text and its
    /// schedule is removed. On success only fixed-time triggers are
    /// deregistered; recurring entries stay armed for their next match.
    pub async fn execute_task(&self, task_id: &str, deregister_on_success: bool) {
        info!(task = task_id, "Trigger fired, starting inspection run");

        match self.orchestrator.run(task_id).await {
            Ok(()) => {
                if deregister_on_success {
                    self.remove_schedule(task_id).await;
                }
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(task = task_id, error = %message, "Inspection run failed");

                match self.store.get_task(task_id).await {
                    Ok(mut task) => {
                        task.state = TaskState::Failed;
                        task.error = Some(message);
                        if let Err(pe) = self.store.update_task(&task).await {
                            error!(task = task_id, error = %pe, "Failed to persist failed task");
                        }
                    }
                    Err(ge) => {
                        error!(task = task_id, error = %ge, "Failed to load task after run failure");
                    }
                }

                self.remove_schedule(task_id).await;
            }
        }
    }

    /// Insert a handle, cancelling any previous trigger for the same id.
    async fn register(&self, task_id: &str, handle: TriggerHandle) {
        let previous = self
            .registry
            .lock()
            .await
            .insert(task_id.to_string(), handle);
        if let Some(previous) = previous {
            warn!(task = task_id, "Replacing an already armed trigger");
            self.cancel(task_id, previous).await;
        }
    }

    async fn cancel(&self, task_id: &str, handle: TriggerHandle) {
        match handle {
            TriggerHandle::Timer(timer) => timer.abort(),
            TriggerHandle::Cron(entry) => {
                if let Err(e) = self.cron.remove(&entry).await {
                    warn!(task = task_id, error = %e, "Failed to unregister cron entry");
                }
            }
        }
    }
}
