use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::orchestrator::TransferOrchestrator;

/// Graceful shutdown coordinator for the webhook server
#[derive(Clone)]
pub struct ShutdownCoordinator {
    orchestrator: Arc<TransferOrchestrator>,
}

impl ShutdownCoordinator {
    pub fn new(orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Resolves on SIGINT or SIGTERM; pass to `axum::serve(..).with_graceful_shutdown`.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }

        info!("Shutdown signal received, draining in-flight webhooks");
    }

    /// Report what is lost with the process. Sessions are memory-only.
    pub async fn shutdown(self) {
        if timeout(Duration::from_secs(5), self.orchestrator.report_on_shutdown())
            .await
            .is_err()
        {
            warn!("Timed out inspecting workflow state during shutdown");
        }
        info!("Graceful shutdown completed");
    }
}
