//! Notification collaborator seam.
//!
//! Rendering and chat delivery live outside this crate; the orchestrator
//! only hands the finished report's coordinates to a [`Notifier`].

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Dispatches a rendered report through a chat application.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    /// Returns an error if delivery fails; the error aborts the run.
    async fn notify(
        &self,
        app_id: &str,
        app_secret: &str,
        file_name: &str,
        file_path: &str,
        message: &str,
    ) -> Result<()>;
}

/// Notifier that only logs the dispatch, for wiring without a chat backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        app_id: &str,
        _app_secret: &str,
        file_name: &str,
        file_path: &str,
        message: &str,
    ) -> Result<()> {
        info!(app_id, file_name, file_path, message, "Notification dispatched (log only)");
        Ok(())
    }
}
