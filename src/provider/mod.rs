// Outbound call placement - the one capability the orchestrator needs from the calling provider

pub mod twilio;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use twilio::TwilioClient;

/// Account credentials used to authenticate a placement request.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// A call leg to place: who to ring, what they hear, and where to report completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub to: String,
    pub from: String,
    /// Rendered call-control markup executed once the leg is answered.
    pub markup: String,
    /// Invoked by the provider when the leg completes.
    pub status_callback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    pub call_sid: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected the call (HTTP {status}): {message}")]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[error("call placement timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("could not reach the calling provider: {0}")]
    Transport(String),
    #[error("unexpected response from the calling provider: {0}")]
    InvalidResponse(String),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Place one outbound call leg.
    async fn place_call(
        &self,
        credentials: &ProviderCredentials,
        call: OutboundCall,
    ) -> Result<PlacedCall, ProviderError>;
}
