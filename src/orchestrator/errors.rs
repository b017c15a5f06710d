use thiserror::Error;

use crate::branch_config::BranchConfigError;
use crate::markup::MarkupError;
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Missing or invalid credentials, caller number, callback URL or destination.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

impl From<BranchConfigError> for OrchestratorError {
    fn from(err: BranchConfigError) -> Self {
        OrchestratorError::Configuration(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("emergency {session_id} is already in progress")]
    SessionActive { session_id: String },
    #[error("workflow did not accept the {event} event")]
    Unhandled { event: &'static str },
}
