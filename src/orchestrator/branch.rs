use reqwest::Url;

use super::errors::OrchestratorError;
use super::types::Session;

pub const DEFAULT_BRANCH: &str = "default";
pub const LEG_ENDED_PATH: &str = "/events/tech_notification_ended";

/// How a session's holding queue is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKeyStrategy {
    /// Queue named after the session id (single-tenant deployments).
    PerSession,
    /// Queue named after the branch, shared by every session of that branch.
    PerBranch,
}

/// Everything that differs between a single-tenant and a per-branch orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub branch_id: String,
    pub queue_keys: QueueKeyStrategy,
    /// Externally reachable base URL used to build completion callbacks.
    pub public_url: Option<String>,
}

impl BranchContext {
    pub fn single_tenant(public_url: Option<String>) -> Self {
        Self {
            branch_id: DEFAULT_BRANCH.to_string(),
            queue_keys: QueueKeyStrategy::PerSession,
            public_url,
        }
    }

    pub fn branch(branch_id: impl Into<String>, public_url: Option<String>) -> Self {
        Self {
            branch_id: branch_id.into(),
            queue_keys: QueueKeyStrategy::PerBranch,
            public_url,
        }
    }

    pub fn queue_key(&self, session_id: &str) -> String {
        match self.queue_keys {
            QueueKeyStrategy::PerSession => session_id.to_string(),
            QueueKeyStrategy::PerBranch => self.branch_id.clone(),
        }
    }

    /// Callback URL the provider hits when the notification leg completes.
    pub fn completion_callback(&self, session: &Session) -> Result<String, OrchestratorError> {
        let base = self
            .public_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                OrchestratorError::Configuration(
                    "public URL is not set; completion callbacks cannot be registered".to_string(),
                )
            })?;

        let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), LEG_ENDED_PATH))
            .map_err(|e| {
                OrchestratorError::Configuration(format!("invalid public URL '{base}': {e}"))
            })?;
        url.query_pairs_mut()
            .append_pair("session", &session.id)
            .append_pair("tech", &session.technician_address);

        Ok(url.into())
    }
}
