//! Inspector daemon entry point.
//!
//! Loads tasks and templates from a seed file, arms their triggers and keeps
//! the scheduling engine running. The relational store, report rendering and
//! chat delivery are external collaborators; the standalone binary wires the
//! in-memory store and the log-only notifier in their place.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use inspector::alerts::HttpAlertSource;
use inspector::cluster::{KubeCapability, StaticProvider};
use inspector::notify::LogNotifier;
use inspector::store::MemoryStore;
use inspector::{InspectorConfig, Orchestrator, Scheduler, Task, Template};

/// Scheduled health inspections of externally managed Kubernetes clusters
#[derive(Parser)]
#[command(name = "inspector")]
#[command(about = "Scheduled health inspections of Kubernetes clusters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the JSON seed file with tasks and templates
    #[arg(long, default_value = "inspector-seed.json", global = true)]
    seed: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Arm every seeded task's trigger and run until interrupted
    Serve,
    /// Run one seeded task immediately and exit
    Run {
        /// Task id to execute
        #[arg(long)]
        task_id: String,
    },
}

/// Tasks and templates seeded into the in-memory store.
#[derive(Debug, Deserialize)]
struct SeedData {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    templates: Vec<Template>,
}

impl SeedData {
    fn load(path: &PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }
}

async fn build_orchestrator(
    config: &InspectorConfig,
    store: Arc<MemoryStore>,
) -> Result<Arc<Orchestrator>> {
    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let capability = KubeCapability::new(
        config.cluster_name.clone(),
        config.cluster_name.clone(),
        client,
    );
    let provider = StaticProvider::new(vec![Arc::new(capability)]);
    let alerts = HttpAlertSource::new(config.alerts_base_url.clone());

    Ok(Arc::new(Orchestrator::new(
        store,
        Arc::new(provider),
        Arc::new(alerts),
        Arc::new(LogNotifier),
        config.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inspector=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => InspectorConfig::from_file(path)?,
        None => InspectorConfig::default(),
    };

    let seed = SeedData::load(&cli.seed)?;
    let store = Arc::new(MemoryStore::new());
    for template in seed.templates {
        store.put_template(template).await;
    }
    let tasks = seed.tasks.clone();
    for task in seed.tasks {
        store.put_task(task).await;
    }

    let orchestrator = build_orchestrator(&config, store.clone()).await?;
    let scheduler = Scheduler::new(orchestrator, store).await?;

    match cli.command {
        Commands::Serve => {
            for task in &tasks {
                scheduler.add_schedule(task).await?;
                info!(task = %task.id, "Trigger armed");
            }
            info!(tasks = tasks.len(), "Inspector running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to wait for shutdown signal")?;
            info!("Shutting down");
        }
        Commands::Run { task_id } => {
            scheduler.execute_task(&task_id, false).await;
        }
    }

    Ok(())
}
